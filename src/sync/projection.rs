//! Local projection store: per-scope ordered collections of one entity kind.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::reconciler::{self, Change, Outcome};
use crate::models::Entity;

/// Scope key for kinds that are not partitioned (the trip list).
pub const UNSCOPED: &str = "";

#[derive(Debug)]
struct Inner<T> {
    scopes: HashMap<String, Vec<T>>,
    /// Full fetches in flight per scope.
    loads: HashMap<String, usize>,
}

/// In-memory mirror of the server collections a client currently displays.
///
/// Each scope holds the last full fetch plus every change applied since.
/// Readers watch [`ProjectionStore::changes`] and re-read on every bump.
#[derive(Debug)]
pub struct ProjectionStore<T> {
    inner: Mutex<Inner<T>>,
    version: watch::Sender<u64>,
}

impl<T: Entity> Default for ProjectionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> ProjectionStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                scopes: HashMap::new(),
                loads: HashMap::new(),
            }),
            version: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Receiver that ticks on every change to any scope.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Current ordered collection of a scope (empty if never loaded).
    pub fn items(&self, scope: &str) -> Vec<T> {
        self.lock().scopes.get(scope).cloned().unwrap_or_default()
    }

    pub fn get(&self, scope: &str, id: &str) -> Option<T> {
        self.lock()
            .scopes
            .get(scope)?
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn len(&self, scope: &str) -> usize {
        self.lock().scopes.get(scope).map_or(0, Vec::len)
    }

    pub fn contains_scope(&self, scope: &str) -> bool {
        self.lock().scopes.contains_key(scope)
    }

    /// Whether any full fetch of `scope` is still in flight.
    pub fn is_loading(&self, scope: &str) -> bool {
        self.lock().loads.contains_key(scope)
    }

    /// Record a full fetch of `scope` starting. The scope itself is not created.
    pub fn begin_load(&self, scope: &str) {
        *self.lock().loads.entry(scope.to_string()).or_default() += 1;
        self.bump();
    }

    /// Record a fetch started by [`ProjectionStore::begin_load`] ending.
    ///
    /// `Some(items)` commits the fetch; `None` abandons it and leaves the
    /// scope's contents alone. Other fetches of the same scope keep it loading.
    pub fn finish_load(&self, scope: &str, fetched: Option<Vec<T>>) {
        let mut inner = self.lock();
        if let Some(count) = inner.loads.get_mut(scope) {
            *count -= 1;
            if *count == 0 {
                inner.loads.remove(scope);
            }
        }
        if let Some(items) = fetched {
            inner.scopes.insert(scope.to_string(), items);
        }
        drop(inner);
        self.bump();
    }

    /// Commit a full fetch: the scope becomes exactly `items`.
    pub fn replace(&self, scope: &str, items: Vec<T>) {
        self.lock().scopes.insert(scope.to_string(), items);
        self.bump();
    }

    /// Apply one change through the reconciler.
    ///
    /// A `created` for a scope never loaded starts that scope; updates and
    /// deletes against it leave the store untouched.
    pub fn apply(&self, scope: &str, change: Change<T>) -> Outcome {
        let mut inner = self.lock();
        let outcome = match inner.scopes.get_mut(scope) {
            Some(items) => reconciler::apply(items, change),
            None => match change {
                Change::Created(entity) => {
                    inner.scopes.insert(scope.to_string(), vec![entity]);
                    Outcome::Inserted
                }
                Change::Updated(_) | Change::Deleted(_) => Outcome::Ignored,
            },
        };
        drop(inner);

        if outcome.changed() {
            self.bump();
        }
        outcome
    }

    /// Swap an optimistic entry stored under `temp_id` for the server's copy.
    ///
    /// If the server echo already inserted the real id the temporary entry is
    /// dropped, so the scope never holds both.
    pub fn confirm_created(&self, scope: &str, temp_id: &str, entity: T) {
        let mut inner = self.lock();
        let items = inner.scopes.entry(scope.to_string()).or_default();

        let temp = items.iter().position(|item| item.id() == temp_id);
        let echoed = items.iter().any(|item| item.id() == entity.id());
        match (temp, echoed) {
            (Some(index), true) => {
                items.remove(index);
            }
            (Some(index), false) => items[index] = entity,
            (None, _) => {
                reconciler::apply(items, Change::Created(entity));
            }
        }
        drop(inner);
        self.bump();
    }

    /// Remove an entity, returning it with its position for a later restore.
    pub fn take(&self, scope: &str, id: &str) -> Option<(usize, T)> {
        let mut inner = self.lock();
        let items = inner.scopes.get_mut(scope)?;
        let index = items.iter().position(|item| item.id() == id)?;
        let entity = items.remove(index);
        drop(inner);
        self.bump();
        Some((index, entity))
    }

    /// Put back an entity removed by [`ProjectionStore::take`], unless an
    /// event re-created it meanwhile.
    pub fn restore(&self, scope: &str, index: usize, entity: T) {
        let mut inner = self.lock();
        let items = inner.scopes.entry(scope.to_string()).or_default();
        if items.iter().any(|item| item.id() == entity.id()) {
            return;
        }
        items.insert(index.min(items.len()), entity);
        drop(inner);
        self.bump();
    }
}
