//! Websocket transport for the realtime feed.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::domain::errors::{FeedError, FeedResult};

use super::payloads::FeedFrame;

/// Time allowed for the websocket handshake.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

/// Transport over which feed frames travel. Faked in tests.
#[async_trait]
pub trait FeedConnection: Send + Sync {
    /// Opens the transport.
    async fn connect(&mut self, url: &str) -> FeedResult<()>;
    /// Closes the transport.
    async fn disconnect(&mut self) -> FeedResult<()>;
    /// Sends one frame.
    async fn send(&mut self, frame: &FeedFrame) -> FeedResult<()>;
    /// Receives the next frame, or `None` for transport noise.
    async fn receive(&mut self) -> FeedResult<Option<FeedFrame>>;
    /// True while the transport is open.
    fn is_connected(&self) -> bool;
}

/// Production transport over tokio-tungstenite.
pub struct WebSocketFeedConnection {
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    connected: bool,
}

impl WebSocketFeedConnection {
    /// Creates a disconnected transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            writer: None,
            reader: None,
            connected: false,
        }
    }
}

impl Default for WebSocketFeedConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedConnection for WebSocketFeedConnection {
    async fn connect(&mut self, url: &str) -> FeedResult<()> {
        let connect_future = connect_async(url);
        let (ws_stream, _) = timeout(CONNECTION_TIMEOUT, connect_future)
            .await
            .map_err(|_| FeedError::timeout("connection"))?
            .map_err(|e| FeedError::connection_failed(e.to_string()))?;

        let (writer, reader) = ws_stream.split();
        self.writer = Some(writer);
        self.reader = Some(reader);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> FeedResult<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        self.connected = false;
        debug!("Feed connection closed");
        Ok(())
    }

    async fn send(&mut self, frame: &FeedFrame) -> FeedResult<()> {
        let writer = self.writer.as_mut().ok_or(FeedError::NotConnected)?;
        let json =
            serde_json::to_string(frame).map_err(|e| FeedError::serialization(e.to_string()))?;
        writer
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| FeedError::websocket(e.to_string()))?;
        Ok(())
    }

    async fn receive(&mut self) -> FeedResult<Option<FeedFrame>> {
        let reader = self.reader.as_mut().ok_or(FeedError::NotConnected)?;

        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let frame: FeedFrame = serde_json::from_str(&text)
                        .map_err(|e| FeedError::serialization(e.to_string()))?;
                    return Ok(Some(frame));
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Some(writer) = self.writer.as_mut() {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    self.connected = false;
                    let reason = frame.map_or_else(
                        || "normal closure".to_string(),
                        |f| f.reason.to_string(),
                    );
                    return Err(FeedError::ConnectionClosed { reason });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.connected = false;
                    return Err(FeedError::websocket(e.to_string()));
                }
                None => {
                    self.connected = false;
                    return Err(FeedError::ConnectionClosed {
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
