//! Client error taxonomy.

use thiserror::Error;

/// Errors surfaced by the sync client.
///
/// Transport failures are recovered by the reconnect loop and only mark the
/// connection stale; they reach callers solely from REST calls.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server rejected request ({status}): {code}: {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl SyncError {
    /// Server-side error code, when the server answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            SyncError::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}
