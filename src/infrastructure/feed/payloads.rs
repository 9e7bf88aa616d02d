//! Wire frames for the Phoenix-style realtime channel.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::entities::{ChangeEvent, ChangeKind, TableName};

/// Channel events we produce or care about.
pub const EVENT_JOIN: &str = "phx_join";
/// Server reply to a pushed frame.
pub const EVENT_REPLY: &str = "phx_reply";
/// Channel-level error.
pub const EVENT_ERROR: &str = "phx_error";
/// Heartbeat push.
pub const EVENT_HEARTBEAT: &str = "heartbeat";
/// Row-change notification.
pub const EVENT_CHANGES: &str = "postgres_changes";

const HEARTBEAT_TOPIC: &str = "phoenix";

/// One frame on the channel, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedFrame {
    /// Channel topic, `realtime:<table>` for subscriptions.
    pub topic: String,
    /// Event name.
    pub event: String,
    /// Event payload.
    pub payload: Value,
    /// Client reference echoed back in replies.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

impl FeedFrame {
    /// Topic used for a table subscription.
    #[must_use]
    pub fn topic_for(table: TableName) -> String {
        format!("realtime:{table}")
    }

    /// Builds the join frame subscribing to every change on a table.
    #[must_use]
    pub fn join(table: TableName) -> Self {
        Self {
            topic: Self::topic_for(table),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "postgres_changes": [
                        {"event": "*", "schema": "public", "table": table.as_str()}
                    ]
                }
            }),
            reference: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Builds a heartbeat frame.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(Uuid::new_v4().to_string()),
        }
    }

    /// True for a heartbeat acknowledgment reply.
    #[must_use]
    pub fn is_heartbeat_ack(&self) -> bool {
        self.topic == HEARTBEAT_TOPIC && self.event == EVENT_REPLY
    }

    /// True for an ok reply to a join push.
    #[must_use]
    pub fn is_join_ok(&self) -> bool {
        self.event == EVENT_REPLY
            && self.topic != HEARTBEAT_TOPIC
            && self.payload.get("status").and_then(Value::as_str) == Some("ok")
    }

    /// True for a refused reply to a join push.
    #[must_use]
    pub fn is_join_error(&self) -> bool {
        self.event == EVENT_REPLY
            && self.topic != HEARTBEAT_TOPIC
            && self.payload.get("status").and_then(Value::as_str) == Some("error")
    }

    /// Parses a row-change frame into a typed event.
    ///
    /// Frames for unknown tables or malformed change kinds are dropped; the
    /// watched-table set is closed.
    #[must_use]
    pub fn parse_change(&self) -> Option<ChangeEvent> {
        if self.event != EVENT_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        let table = TableName::from_str_opt(data.get("table")?.as_str()?)?;
        let kind = match data.get("type")?.as_str()? {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return None,
        };
        let payload = data.get("record").cloned().unwrap_or(Value::Null);
        Some(ChangeEvent::new(table, kind, payload))
    }
}
