//! Configuration for the tripsync server and sync client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Output format of the fmt logging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API and realtime authentication
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Capacity of the publisher's fan-out buffer
    pub event_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("TRIPSYNC_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("TRIPSYNC_DB_PATH")
            .unwrap_or_else(|_| "./data/tripsync.sqlite".to_string())
            .into();

        let bind_addr = env::var("TRIPSYNC_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr.parse().map_err(|e| {
            AppError::Internal(format!("Invalid TRIPSYNC_BIND_ADDR `{}`: {}", bind_addr, e))
        })?;

        let log_level = env::var("TRIPSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("TRIPSYNC_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let event_buffer = match env::var("TRIPSYNC_EVENT_BUFFER") {
            Ok(raw) => raw.parse().map_err(|e| {
                AppError::Internal(format!("Invalid TRIPSYNC_EVENT_BUFFER `{}`: {}", raw, e))
            })?,
            Err(_) => 256,
        };

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            log_format,
            event_buffer,
        })
    }
}

/// Sync client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `http://127.0.0.1:8080`
    pub server_url: String,
    pub api_key: Option<String>,
    pub user_id: String,
    /// First reconnect delay; doubles up to `max_backoff`
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            user_id: user_id.into(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Load client configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let server_url = env::var("TRIPSYNC_SERVER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let user_id = env::var("TRIPSYNC_USER_ID")
            .map_err(|_| AppError::Internal("TRIPSYNC_USER_ID is not set".to_string()))?;

        let mut config = Self::new(server_url, user_id);
        config.api_key = env::var("TRIPSYNC_API_PSK").ok().filter(|s| !s.is_empty());
        Ok(config)
    }

    /// WebSocket endpoint derived from the server URL.
    pub fn ws_url(&self) -> String {
        match self.server_url.as_str() {
            u if u.starts_with("ws://") || u.starts_with("wss://") => format!("{}/ws", u),
            u if u.starts_with("http://") => format!("ws://{}/ws", &u[7..]),
            u if u.starts_with("https://") => format!("wss://{}/ws", &u[8..]),
            u => format!("wss://{}/ws", u),
        }
    }
}
