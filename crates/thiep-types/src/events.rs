use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// Frames pushed over the live chat WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ThreadEvent {
    /// The complete, ordered message list of a thread. Replaces whatever the
    /// client held before.
    Snapshot {
        thread_key: String,
        messages: Vec<ChatMessage>,
    },

    /// The subscription ended on the server side.
    Closed { thread_key: String },
}
