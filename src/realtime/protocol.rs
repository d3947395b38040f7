//! WebSocket control frames exchanged alongside event envelopes.

use serde::{Deserialize, Serialize};

use super::EventEnvelope;

/// Frames a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Auth {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        user_id: String,
    },
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
}

/// Control frames the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Authenticated { user_id: String },
    Subscribed { channel: String },
    Error { code: String, message: String },
    Lagged { missed: u64 },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Anything the server may send: a control frame or an event envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Control(ServerFrame),
    Event(EventEnvelope),
}

impl Incoming {
    /// Decode a text frame. Unknown or malformed frames yield `None`.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
