//! Periodic heartbeat keeping the feed socket alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::payloads::FeedFrame;

/// Drives heartbeat frames at a fixed interval and tracks whether the
/// server acknowledged the previous one.
pub struct HeartbeatManager {
    interval: Duration,
    acked: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatManager {
    /// Creates a stopped manager with the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            acked: Arc::new(AtomicBool::new(true)),
            task: None,
        }
    }

    /// Starts sending serialized heartbeat frames on `outbound`.
    ///
    /// If the previous heartbeat was never acknowledged the task stops
    /// and drops the sender, which the read loop observes as a dead
    /// connection.
    pub fn start(&mut self, outbound: mpsc::Sender<String>) {
        self.stop();
        self.acked.store(true, Ordering::SeqCst);

        let interval = self.interval;
        let acked = Arc::clone(&self.acked);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it so the join settles first.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if !acked.swap(false, Ordering::SeqCst) {
                    warn!("Heartbeat not acknowledged, stopping heartbeat task");
                    return;
                }

                let frame = FeedFrame::heartbeat();
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize heartbeat");
                        continue;
                    }
                };

                trace!("Sending heartbeat");
                if outbound.send(json).await.is_err() {
                    return;
                }
            }
        });
        self.task = Some(task);
    }

    /// Records a heartbeat acknowledgement from the server.
    pub fn acknowledge(&self) {
        self.acked.store(true, Ordering::SeqCst);
    }

    /// True if the last heartbeat was acknowledged.
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }

    /// Stops the heartbeat task if running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for HeartbeatManager {
    fn drop(&mut self) {
        self.stop();
    }
}
