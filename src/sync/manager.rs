//! Per-view subscription lifecycle.
//!
//! A view mounts a [`ViewSubscription`], declares which scopes of which
//! stores it displays, and drops it on unmount. Only the tokens registered by
//! that view are released, so views sharing a channel never silence each
//! other.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::reconciler;
use super::registry::{Handler, SubscriptionToken};
use super::{Connection, ConnectionState, ProjectionStore, SyncContext};
use crate::models::Entity;
use crate::realtime::{Channel, EntityKind, EventEnvelope, EventType};

/// Cleared when a view unmounts; in-flight work checks it before committing.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Idle,
    Connecting,
    Subscribed,
    TearingDown,
}

/// Identifies one `watch` group inside a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(usize);

/// Builds the handler for one scope of a watch.
pub type HandlerFactory = Box<dyn Fn(&str) -> Handler + Send + Sync>;

struct Watch {
    kind: EntityKind,
    make_handler: HandlerFactory,
    scopes: BTreeMap<String, Vec<SubscriptionToken>>,
}

/// Hands out view subscriptions that share the context's connection.
#[derive(Clone)]
pub struct SubscriptionManager {
    context: Arc<SyncContext>,
}

impl SubscriptionManager {
    pub fn new(context: Arc<SyncContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    pub fn mount(&self) -> ViewSubscription {
        ViewSubscription {
            context: self.context.clone(),
            connection: None,
            phase: ViewPhase::Idle,
            watches: Vec::new(),
            liveness: Liveness::new(),
        }
    }
}

/// The subscriptions of one mounted view. Dropping it unmounts the view.
pub struct ViewSubscription {
    context: Arc<SyncContext>,
    connection: Option<Arc<Connection>>,
    phase: ViewPhase,
    watches: Vec<Watch>,
    liveness: Liveness,
}

impl ViewSubscription {
    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Whether the projections this view renders may have missed events.
    pub fn is_stale(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_stale())
    }

    /// Acknowledge a refetch of this view's scopes.
    pub fn mark_fresh(&self) {
        if let Some(connection) = &self.connection {
            connection.mark_fresh();
        }
    }

    fn connection(&mut self) -> Arc<Connection> {
        self.connection
            .get_or_insert_with(|| self.context.connection())
            .clone()
    }

    /// Feed every event of `T` for `scopes` into `store`.
    pub fn watch<T: Entity>(
        &mut self,
        store: Arc<ProjectionStore<T>>,
        scopes: impl IntoIterator<Item = String>,
    ) -> WatchId {
        let liveness = self.liveness.clone();
        let make_handler: HandlerFactory = Box::new(move |scope: &str| {
            let store = store.clone();
            let scope = scope.to_string();
            let liveness = liveness.clone();
            let handler: Handler = Arc::new(move |envelope: &EventEnvelope| {
                if liveness.is_alive() {
                    reconciler::apply_envelope(&store, &scope, envelope);
                }
            });
            handler
        });
        self.listen(T::KIND, make_handler, scopes)
    }

    /// Register a custom handler for every event of `kind` on `scopes`.
    pub fn listen(
        &mut self,
        kind: EntityKind,
        make_handler: HandlerFactory,
        scopes: impl IntoIterator<Item = String>,
    ) -> WatchId {
        let id = WatchId(self.watches.len());
        self.watches.push(Watch {
            kind,
            make_handler,
            scopes: BTreeMap::new(),
        });
        self.retarget(id, scopes);
        id
    }

    /// Move a watch to a new scope set: scopes no longer wanted are
    /// unsubscribed, new ones subscribed, unchanged ones left alone.
    pub fn retarget(&mut self, id: WatchId, scopes: impl IntoIterator<Item = String>) {
        let connection = self.connection();
        let wanted: Vec<String> = scopes.into_iter().collect();
        let Some(watch) = self.watches.get_mut(id.0) else {
            return;
        };

        let dropped: Vec<String> = watch
            .scopes
            .keys()
            .filter(|scope| !wanted.contains(scope))
            .cloned()
            .collect();
        if !dropped.is_empty() {
            self.phase = ViewPhase::TearingDown;
        }
        for scope in dropped {
            if let Some(tokens) = watch.scopes.remove(&scope) {
                for token in tokens {
                    connection.unsubscribe(token);
                }
            }
        }

        for scope in wanted {
            if watch.scopes.contains_key(&scope) {
                continue;
            }
            let channel = Channel::route(watch.kind, &scope).name();
            let handler = (watch.make_handler)(&scope);
            let tokens = EventType::all_for(watch.kind)
                .into_iter()
                .map(|event_type| {
                    connection.subscribe_handler(channel.clone(), event_type, handler.clone())
                })
                .collect();
            watch.scopes.insert(scope, tokens);
        }

        self.phase = match connection.state() {
            ConnectionState::Connected => ViewPhase::Subscribed,
            _ => ViewPhase::Connecting,
        };
    }

    /// Scopes currently watched by one watch group.
    pub fn scopes(&self, id: WatchId) -> Vec<String> {
        self.watches
            .get(id.0)
            .map(|w| w.scopes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Wait until the shared connection is authenticated and joined.
    pub async fn ready(&mut self) {
        let connection = self.connection();
        connection.wait_connected().await;
        if self.phase == ViewPhase::Connecting {
            self.phase = ViewPhase::Subscribed;
        }
    }

    /// Release exactly the registrations this view made.
    pub fn unmount(&mut self) {
        self.liveness.kill();
        if self.watches.is_empty() {
            return;
        }

        self.phase = ViewPhase::TearingDown;
        if let Some(connection) = &self.connection {
            let mut released = 0;
            for watch in self.watches.drain(..) {
                for token in watch.scopes.into_values().flatten() {
                    connection.unsubscribe(token);
                    released += 1;
                }
            }
            debug!(released, "View unmounted");
        }
        self.watches.clear();
        self.phase = ViewPhase::Idle;
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.unmount();
    }
}
