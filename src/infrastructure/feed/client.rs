//! Realtime change-feed client with automatic reconnection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{ChangeEvent, TableName};
use crate::domain::errors::{FeedError, FeedResult};

use super::connection::{FeedConnection, WebSocketFeedConnection};
use super::heartbeat::HeartbeatManager;
use super::payloads::{EVENT_ERROR, FeedFrame};

/// First reconnect delay.
pub const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(1);
/// Ceiling for the exponential reconnect delay, before jitter.
pub const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(60);
/// Maximum random jitter added to each reconnect delay.
pub const RECONNECT_JITTER_MAX: Duration = Duration::from_millis(500);
/// Reconnect attempts before the loop gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default interval between heartbeat pushes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`FeedClient`].
pub struct FeedClientConfig {
    /// Websocket endpoint of the change feed.
    pub url: String,
    /// Tables to subscribe to.
    pub tables: Vec<TableName>,
    /// Interval between heartbeat pushes.
    pub heartbeat_interval: Duration,
    /// Whether to reconnect after a recoverable failure.
    pub auto_reconnect: bool,
    /// Attempts before the reconnect loop gives up.
    pub max_reconnect_attempts: u32,
}

impl FeedClientConfig {
    /// Creates a config subscribed to every watched table.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tables: TableName::ALL.to_vec(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            auto_reconnect: true,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }

    /// Restricts the subscription to the given tables.
    #[must_use]
    pub fn with_tables(mut self, tables: Vec<TableName>) -> Self {
        self.tables = tables;
        self
    }

    /// Overrides the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enables or disables automatic reconnection.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Overrides the reconnect attempt limit.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

/// Events surfaced by the feed to its consumer.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The socket is open and joins are in flight.
    Connected,
    /// A table subscription was acknowledged.
    Subscribed {
        /// The table that was joined.
        table: TableName,
    },
    /// The connection dropped.
    Disconnected {
        /// Human-readable reason.
        reason: String,
    },
    /// A reconnect attempt is about to start.
    Reconnecting {
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// A row changed in a watched table.
    Change(ChangeEvent),
    /// An error occurred.
    Error {
        /// Human-readable description.
        message: String,
        /// Whether the loop will keep trying.
        recoverable: bool,
    },
}

/// Long-lived client owning the feed connection task.
pub struct FeedClient {
    config: Option<FeedClientConfig>,
    running: Arc<AtomicBool>,
}

impl FeedClient {
    /// Creates a client that has not yet connected.
    #[must_use]
    pub fn new(config: FeedClientConfig) -> Self {
        Self {
            config: Some(config),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the connection loop and returns its event stream.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::AlreadyConnected`] if the loop is already running.
    pub fn connect(&mut self) -> FeedResult<mpsc::UnboundedReceiver<FeedEvent>> {
        if self.running.load(Ordering::SeqCst) {
            return Err(FeedError::AlreadyConnected);
        }
        let config = self.config.take().ok_or(FeedError::AlreadyConnected)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(run_feed_loop(
                config,
                event_tx.clone(),
                running.clone(),
                WebSocketFeedConnection::new,
            ));

            if let Err(panic_info) = result.catch_unwind().await {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                error!(panic = %panic_msg, "Feed task panicked");
                running.store(false, Ordering::SeqCst);
                let _ = event_tx.send(FeedEvent::Error {
                    message: format!("Feed task panicked: {panic_msg}"),
                    recoverable: false,
                });
            }
        });

        Ok(event_rx)
    }

    /// Signals the connection loop to stop.
    pub fn disconnect(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True while the connection loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn run_feed_loop<C, F>(
    config: FeedClientConfig,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    running: Arc<AtomicBool>,
    mut make_connection: F,
) where
    C: FeedConnection,
    F: FnMut() -> C,
{
    let mut reconnect_attempts: u32 = 0;

    while running.load(Ordering::SeqCst) {
        let connection = make_connection();

        let result =
            run_single_connection(connection, &config, &event_tx, &running).await;

        match result {
            Ok(()) => break,
            Err(e) => {
                warn!(error = %e, "Feed connection ended");
                let recoverable = e.should_reconnect();
                let _ = event_tx.send(FeedEvent::Disconnected {
                    reason: e.to_string(),
                });
                let _ = event_tx.send(FeedEvent::Error {
                    message: e.to_string(),
                    recoverable,
                });

                if !recoverable || !config.auto_reconnect {
                    break;
                }
                reconnect_attempts += 1;
            }
        }

        if !running.load(Ordering::SeqCst) {
            break;
        }

        if reconnect_attempts >= config.max_reconnect_attempts {
            error!(
                attempts = reconnect_attempts,
                "Max reconnection attempts exceeded"
            );
            let _ = event_tx.send(FeedEvent::Error {
                message: FeedError::ReconnectLimitExceeded {
                    attempts: reconnect_attempts,
                }
                .to_string(),
                recoverable: false,
            });
            break;
        }

        let delay = calculate_backoff_delay(reconnect_attempts);
        info!(
            attempt = reconnect_attempts,
            delay_ms = delay.as_millis(),
            "Reconnecting to feed"
        );
        let _ = event_tx.send(FeedEvent::Reconnecting {
            attempt: reconnect_attempts,
        });

        sleep(delay).await;
    }

    running.store(false, Ordering::SeqCst);
    info!("Feed loop terminated");
}

async fn run_single_connection(
    mut connection: impl FeedConnection,
    config: &FeedClientConfig,
    event_tx: &mpsc::UnboundedSender<FeedEvent>,
    running: &Arc<AtomicBool>,
) -> FeedResult<()> {
    connection.connect(&config.url).await?;
    info!(url = %config.url, "Feed connected");
    let _ = event_tx.send(FeedEvent::Connected);

    for table in &config.tables {
        connection.send(&FeedFrame::join(*table)).await?;
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(8);
    let mut heartbeat = HeartbeatManager::new(config.heartbeat_interval);
    heartbeat.start(outbound_tx);

    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }

        // Resolve the select before touching the connection again so the
        // receive future's borrow is released.
        let step = tokio::select! {
            frame = connection.receive() => Step::Inbound(frame),
            outbound = outbound_rx.recv() => Step::Outbound(outbound),
        };

        match step {
            Step::Inbound(Ok(Some(frame))) => {
                if let Err(e) = handle_frame(&frame, &heartbeat, event_tx) {
                    break Err(e);
                }
            }
            Step::Inbound(Ok(None)) => {}
            Step::Inbound(Err(e)) => break Err(e),
            Step::Outbound(Some(json)) => {
                let frame = match serde_json::from_str::<FeedFrame>(&json) {
                    Ok(frame) => frame,
                    Err(e) => break Err(FeedError::serialization(e.to_string())),
                };
                if let Err(e) = connection.send(&frame).await {
                    break Err(e);
                }
            }
            Step::Outbound(None) => break Err(FeedError::HeartbeatTimeout),
        }
    };

    heartbeat.stop();
    let _ = connection.disconnect().await;
    result
}

enum Step {
    Inbound(FeedResult<Option<FeedFrame>>),
    Outbound(Option<String>),
}

fn handle_frame(
    frame: &FeedFrame,
    heartbeat: &HeartbeatManager,
    event_tx: &mpsc::UnboundedSender<FeedEvent>,
) -> FeedResult<()> {
    if frame.is_heartbeat_ack() {
        heartbeat.acknowledge();
        return Ok(());
    }

    if frame.is_join_ok() {
        if let Some(table) = table_from_topic(&frame.topic) {
            debug!(table = %table, "Subscription acknowledged");
            let _ = event_tx.send(FeedEvent::Subscribed { table });
        }
        return Ok(());
    }

    if frame.event == EVENT_ERROR {
        // The channel crashed server-side; drop the socket and let the
        // reconnect loop rejoin.
        return Err(FeedError::ConnectionClosed {
            reason: format!("channel error on {}", frame.topic),
        });
    }

    if frame.is_join_error() {
        let reason = frame.payload["response"]["reason"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        return Err(FeedError::SubscriptionRefused {
            topic: frame.topic.clone(),
            reason,
        });
    }

    if let Some(change) = frame.parse_change() {
        debug!(table = %change.table, kind = ?change.kind, "Row change received");
        let _ = event_tx.send(FeedEvent::Change(change));
    }

    Ok(())
}

fn table_from_topic(topic: &str) -> Option<TableName> {
    topic
        .strip_prefix("realtime:")
        .and_then(TableName::from_str_opt)
}

/// Exponential backoff with jitter for reconnect attempt `attempt`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn calculate_backoff_delay(attempt: u32) -> Duration {
    let base_delay = RECONNECT_DELAY_BASE.as_millis() as u64;
    let max_delay = RECONNECT_DELAY_MAX.as_millis() as u64;
    let jitter_max = RECONNECT_JITTER_MAX.as_millis() as u64;

    let exponential_delay = base_delay.saturating_mul(2_u64.saturating_pow(attempt.min(6)));
    let capped_delay = exponential_delay.min(max_delay);

    let jitter = rand_jitter(jitter_max);
    let total_delay = capped_delay.saturating_add(jitter);

    Duration::from_millis(total_delay)
}

fn rand_jitter(max: u64) -> u64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);

    nanos % max
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Connection whose connect always fails, driving the reconnect loop.
    struct RefusingConnection;

    #[async_trait]
    impl FeedConnection for RefusingConnection {
        async fn connect(&mut self, _url: &str) -> FeedResult<()> {
            Err(FeedError::connection_failed("refused"))
        }

        async fn disconnect(&mut self) -> FeedResult<()> {
            Ok(())
        }

        async fn send(&mut self, _frame: &FeedFrame) -> FeedResult<()> {
            Err(FeedError::NotConnected)
        }

        async fn receive(&mut self) -> FeedResult<Option<FeedFrame>> {
            Err(FeedError::NotConnected)
        }

        fn is_connected(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_config_builder() {
        let config = FeedClientConfig::new("wss://example.test/socket")
            .with_tables(vec![TableName::Models])
            .with_auto_reconnect(false)
            .with_max_reconnect_attempts(3);

        assert_eq!(config.tables, vec![TableName::Models]);
        assert!(!config.auto_reconnect);
        assert_eq!(config.max_reconnect_attempts, 3);
    }

    #[test]
    fn test_config_defaults_to_all_tables() {
        let config = FeedClientConfig::new("wss://example.test/socket");
        assert_eq!(config.tables.len(), TableName::ALL.len());
        assert_eq!(config.max_reconnect_attempts, MAX_RECONNECT_ATTEMPTS);
    }

    #[test]
    fn test_backoff_delay() {
        let delay0 = calculate_backoff_delay(0);
        let delay1 = calculate_backoff_delay(1);
        let delay2 = calculate_backoff_delay(2);

        assert!(delay0 < delay1);
        assert!(delay1 < delay2);

        let delay_max = calculate_backoff_delay(100);
        assert!(delay_max <= RECONNECT_DELAY_MAX + RECONNECT_JITTER_MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_loop_gives_up_after_attempt_limit() {
        let config = FeedClientConfig::new("wss://example.test/socket")
            .with_max_reconnect_attempts(3);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        run_feed_loop(config, tx, running.clone(), || RefusingConnection).await;
        assert!(!running.load(Ordering::SeqCst));

        let mut reconnects = 0u32;
        let mut fatal = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                FeedEvent::Reconnecting { attempt } => {
                    reconnects += 1;
                    assert_eq!(attempt, reconnects);
                }
                FeedEvent::Error {
                    message,
                    recoverable: false,
                } => fatal = Some(message),
                _ => {}
            }
        }

        // the third failed attempt hits the limit without another retry
        assert_eq!(reconnects, 2);
        let fatal = fatal.expect("terminal error event");
        assert!(fatal.contains("reconnection limit exceeded"));
    }

    #[test]
    fn test_client_initial_state() {
        let client = FeedClient::new(FeedClientConfig::new("wss://example.test/socket"));
        assert!(!client.is_running());
    }

    #[test]
    fn test_table_from_topic() {
        assert_eq!(
            table_from_topic("realtime:hero_slides"),
            Some(TableName::HeroSlides)
        );
        assert_eq!(table_from_topic("realtime:unknown_table"), None);
        assert_eq!(table_from_topic("phoenix"), None);
    }

    #[tokio::test]
    async fn test_change_frames_reach_the_event_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatManager::new(Duration::from_secs(30));
        let frame = FeedFrame {
            topic: "realtime:models".to_string(),
            event: super::super::payloads::EVENT_CHANGES.to_string(),
            payload: json!({
                "data": {"type": "UPDATE", "table": "models", "record": {"id": 1}}
            }),
            reference: None,
        };

        handle_frame(&frame, &heartbeat, &tx).unwrap();

        match rx.try_recv().unwrap() {
            FeedEvent::Change(change) => assert_eq!(change.table, TableName::Models),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_channel_error_is_recoverable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatManager::new(Duration::from_secs(30));
        let frame = FeedFrame {
            topic: "realtime:models".to_string(),
            event: EVENT_ERROR.to_string(),
            payload: json!({}),
            reference: None,
        };

        let err = handle_frame(&frame, &heartbeat, &tx).unwrap_err();
        assert!(err.should_reconnect());
    }

    #[tokio::test]
    async fn test_join_refusal_is_surfaced_as_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatManager::new(Duration::from_secs(30));
        let frame = FeedFrame {
            topic: "realtime:models".to_string(),
            event: super::super::payloads::EVENT_REPLY.to_string(),
            payload: json!({"status": "error", "response": {"reason": "unauthorized"}}),
            reference: None,
        };

        let err = handle_frame(&frame, &heartbeat, &tx).unwrap_err();
        assert!(matches!(err, FeedError::SubscriptionRefused { .. }));
        assert!(err.is_fatal());
    }
}
