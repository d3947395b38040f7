//! Data models for trip planning entities.
//!
//! The JSON shapes are camelCase and are used both by the REST surface and as
//! the full-entity payload of realtime event envelopes.

mod accommodation;
mod file;
mod share;
mod snapshot;
mod trip;
mod place;

pub use accommodation::*;
pub use file::*;
pub use place::*;
pub use share::*;
pub use snapshot::*;
pub use trip::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::realtime::EntityKind;

/// An entity mirrored into client projections.
///
/// The server-assigned `id` is the idempotency key for reconciliation and
/// `scope_id` is the owning trip (or place, for place files) that selects the
/// channel the entity's events travel on.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Scope the entity is partitioned by; `None` for unscoped kinds.
    fn scope_id(&self) -> Option<&str>;
}
