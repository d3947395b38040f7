//! Realtime transports.
//!
//! [`WsTransport`] keeps one WebSocket open in a background task, with
//! automatic reconnection and re-subscription of the active channel set.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::{select, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

use super::{Connection, ConnectionState, SyncError};
use crate::config::ClientConfig;
use crate::realtime::ClientFrame;

/// Identity presented to the realtime endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }
}

/// Opens realtime connections.
///
/// `connect` returns immediately; the connection authenticates in the
/// background and defers channel joins until it has.
pub trait Transport: Send + Sync {
    fn connect(&self, credentials: Credentials) -> Arc<Connection>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl WsTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.ws_url(),
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    fn connect(&self, credentials: Credentials) -> Arc<Connection> {
        let (connection, outgoing) = Connection::new();
        let connection = Arc::new(connection);
        info!("Creating realtime connection to {}", self.url);

        tokio::spawn(run_connection_loop(
            self.clone(),
            credentials,
            Arc::downgrade(&connection),
            outgoing,
        ));
        connection
    }
}

/// Main connection loop with automatic reconnection.
///
/// Runs until every handle to the connection is dropped.
async fn run_connection_loop(
    transport: WsTransport,
    credentials: Credentials,
    connection: Weak<Connection>,
    mut outgoing: mpsc::UnboundedReceiver<ClientFrame>,
) {
    let mut backoff = transport.initial_backoff;

    loop {
        match connection.upgrade() {
            Some(conn) => conn.set_state(ConnectionState::Connecting),
            None => break,
        }

        match connect_once(&transport.url, &credentials, &connection, &mut outgoing).await {
            Ok(()) => {
                info!("Realtime connection to {} closed", transport.url);
                backoff = transport.initial_backoff;
            }
            Err(e) => {
                error!("Realtime connection to {} failed: {}", transport.url, e);
            }
        }

        match connection.upgrade() {
            Some(conn) => conn.on_disconnected(),
            None => break,
        }

        info!("Reconnecting in {:?}", backoff);
        sleep(backoff).await;
        backoff = (backoff * 2).min(transport.max_backoff);
    }

    debug!("Realtime connection loop for {} finished", transport.url);
}

/// Attempt a single connection and serve it until it closes.
async fn connect_once(
    url: &str,
    credentials: &Credentials,
    connection: &Weak<Connection>,
    outgoing: &mut mpsc::UnboundedReceiver<ClientFrame>,
) -> Result<(), SyncError> {
    let (ws_stream, _) = connect_async(url).await?;
    debug!("WebSocket handshake completed with {}", url);
    let (mut sink, mut stream) = ws_stream.split();

    // Frames queued for the previous session are replayed by re-joining.
    while outgoing.try_recv().is_ok() {}

    let Some(conn) = connection.upgrade() else {
        return Ok(());
    };
    conn.set_state(ConnectionState::Authenticating);
    drop(conn);

    let auth = ClientFrame::Auth {
        token: credentials.token.clone(),
        user_id: credentials.user_id.clone(),
    };
    sink.send(Message::Text(serde_json::to_string(&auth)?.into()))
        .await?;

    loop {
        select! {
            frame = outgoing.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    return Ok(());
                };
                sink.send(Message::Text(serde_json::to_string(&frame)?.into())).await?;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Some(conn) = connection.upgrade() else {
                            return Ok(());
                        };
                        conn.deliver(text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }
}
