//! Client-side synchronization engine.
//!
//! A [`SyncContext`] lazily owns the process-wide realtime [`Connection`].
//! Views mount a [`ViewSubscription`] that registers per-channel handlers
//! feeding the [`reconciler`], which applies envelopes to per-scope
//! [`ProjectionStore`]s. [`SyncedCollection`] adds full fetches and
//! optimistic writes over the REST API.

mod client;
mod connection;
mod context;
mod error;
mod manager;
mod projection;
pub mod reconciler;
mod registry;
mod resource;
mod today;
mod transport;

pub use client::*;
pub use connection::*;
pub use context::*;
pub use error::*;
pub use manager::*;
pub use projection::*;
pub use reconciler::{Change, Outcome};
pub use registry::*;
pub use resource::*;
pub use today::*;
pub use transport::*;
