use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-to-client envelope: `{"type": ..., "data": ..., "timestamp": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(flatten)]
    pub event: ServerEvent,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn now(event: ServerEvent) -> Self {
        ServerMessage {
            event,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    TaskAssigned(TaskAssigned),
    CommentAdded(CommentAdded),
    StatusChanged(StatusChanged),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssigned {
    pub task_id: i64,
    pub project: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAdded {
    pub task_id: i64,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChanged {
    pub task_id: i64,
    pub old: String,
    pub new: String,
}

/// Liveness ping sent by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Ping,
}

/// Frames a client may send. Anything else is ignored by the read loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Pong,
}
