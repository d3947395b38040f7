//! Client side of one realtime connection.
//!
//! The [`Connection`] owns the subscription registry and the outgoing frame
//! queue. A transport task drives the socket and feeds received text into
//! [`Connection::deliver`]; everything else here is transport independent.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::registry::{Handler, SubscriptionRegistry, SubscriptionToken};
use crate::realtime::{ClientFrame, EventEnvelope, EventType, Incoming, ServerFrame};

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

#[derive(Debug, Default)]
struct Inner {
    registry: SubscriptionRegistry,
    authenticated: bool,
    /// Channels the server confirmed for the current session.
    joined: BTreeSet<String>,
}

#[derive(Debug)]
pub struct Connection {
    inner: Mutex<Inner>,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    state: watch::Sender<ConnectionState>,
    stale: watch::Sender<bool>,
}

impl Connection {
    /// Create a connection and the receiving end of its outgoing frame queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientFrame>) {
        let (outgoing, rx) = mpsc::unbounded_channel();
        let connection = Self {
            inner: Mutex::new(Inner::default()),
            outgoing,
            state: watch::Sender::new(ConnectionState::Disconnected),
            stale: watch::Sender::new(false),
        };
        (connection, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, frame: ClientFrame) {
        if self.outgoing.send(frame).is_err() {
            debug!("Transport task gone, dropping outgoing frame");
        }
    }

    /// Register `handler` for `(channel, event_type)`.
    ///
    /// The first registrant of a channel joins it on the wire; while the
    /// connection is not yet authenticated the join is deferred until it is.
    pub fn subscribe<F>(
        &self,
        channel: impl Into<String>,
        event_type: EventType,
        handler: F,
    ) -> SubscriptionToken
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.subscribe_handler(channel.into(), event_type, std::sync::Arc::new(handler))
    }

    pub fn subscribe_handler(
        &self,
        channel: String,
        event_type: EventType,
        handler: Handler,
    ) -> SubscriptionToken {
        let mut inner = self.lock();
        let (token, first) = inner.registry.register(&channel, event_type, handler);
        if first && inner.authenticated {
            self.send(ClientFrame::Subscribe { channel });
        }
        token
    }

    /// Drop exactly one registration. Returns `false` for a spent token.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut inner = self.lock();
        match inner.registry.remove(token) {
            Some((channel, last)) => {
                if last {
                    inner.joined.remove(&channel);
                    if inner.authenticated {
                        self.send(ClientFrame::Unsubscribe { channel });
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Deliver an envelope to local handlers as if it came off the wire.
    pub fn publish(&self, envelope: &EventEnvelope) {
        self.dispatch(envelope);
    }

    /// Handle one text frame received from the server.
    pub fn deliver(&self, text: &str) {
        match Incoming::decode(text) {
            Some(Incoming::Event(envelope)) => self.dispatch(&envelope),
            Some(Incoming::Control(ServerFrame::Authenticated { user_id })) => {
                debug!(user = %user_id, "Realtime session authenticated");
                self.on_authenticated();
            }
            Some(Incoming::Control(ServerFrame::Subscribed { channel })) => {
                debug!(channel = %channel, "Joined channel");
                let mut inner = self.lock();
                if inner.registry.channels().contains(&channel) {
                    inner.joined.insert(channel);
                }
            }
            Some(Incoming::Control(ServerFrame::Error { code, message })) => {
                warn!(code = %code, "Realtime server error: {}", message);
            }
            Some(Incoming::Control(ServerFrame::Lagged { missed })) => {
                warn!(missed, "Realtime session lagged, projections may be stale");
                self.mark_stale();
            }
            None => debug!("Dropping malformed realtime frame"),
        }
    }

    fn dispatch(&self, envelope: &EventEnvelope) {
        // Collect first: handlers may subscribe or unsubscribe.
        let handlers = self
            .lock()
            .registry
            .handlers_for(&envelope.channel, envelope.event_type);
        for handler in handlers {
            handler(envelope);
        }
    }

    /// The server accepted our identity: join the full active channel set.
    pub fn on_authenticated(&self) {
        let mut inner = self.lock();
        inner.authenticated = true;
        for channel in inner.registry.channels() {
            self.send(ClientFrame::Subscribe { channel });
        }
        drop(inner);
        self.set_state(ConnectionState::Connected);
    }

    /// The socket went away. Joins are replayed after the next authentication.
    pub fn on_disconnected(&self) {
        let mut inner = self.lock();
        inner.authenticated = false;
        inner.joined.clear();
        drop(inner);
        self.set_state(ConnectionState::Disconnected);
        self.mark_stale();
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the connection is authenticated.
    pub async fn wait_connected(&self) {
        let mut rx = self.watch_state();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|state| *state == ConnectionState::Connected).await;
    }

    /// Whether events may have been missed since the last refetch.
    pub fn is_stale(&self) -> bool {
        *self.stale.borrow()
    }

    pub fn watch_stale(&self) -> watch::Receiver<bool> {
        self.stale.subscribe()
    }

    pub fn mark_stale(&self) {
        self.stale.send_replace(true);
    }

    /// A view refetched its scope; clear the stale indicator.
    pub fn mark_fresh(&self) {
        self.stale.send_replace(false);
    }

    /// Channels joined (or to be joined) on the wire.
    pub fn active_channels(&self) -> Vec<String> {
        self.lock().registry.channels()
    }

    /// Channels the server has confirmed joining in this session.
    pub fn joined_channels(&self) -> Vec<String> {
        self.lock().joined.iter().cloned().collect()
    }

    pub fn subscriber_count(&self, channel: &str, event_type: EventType) -> usize {
        self.lock().registry.count(channel, event_type)
    }
}
