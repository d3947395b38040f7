//! REST client and optimistic collections.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::reconciler::Change;
use super::{Liveness, ProjectionStore, Resource, SyncError, Updatable};
use crate::auth::{API_KEY_HEADER, USER_ID_HEADER};
use crate::config::ClientConfig;
use crate::errors::ErrorResponse;
use crate::models::{RevisionInfo, TripSnapshot};

/// Prefix of ids assigned to optimistic creates until the server answers.
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Thin client over the REST API, decoding the response envelope.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    user_id: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.server_url.clone(),
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(USER_ID_HEADER, &self.user_id);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, SyncError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            let envelope: Envelope<T> = serde_json::from_slice(&body)?;
            return Ok(envelope.data);
        }

        match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(err) => Err(SyncError::Server {
                status: status.as_u16(),
                code: err.error.code,
                message: err.error.message,
            }),
            Err(_) => Err(SyncError::Server {
                status: status.as_u16(),
                code: status.canonical_reason().unwrap_or("UNKNOWN").to_string(),
                message: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    /// Full collection of `scope`.
    pub async fn list<T: Resource>(&self, scope: &str) -> Result<Vec<T>, SyncError> {
        self.send(self.request(Method::GET, &T::collection_path(scope)))
            .await
    }

    pub async fn create<T: Resource>(
        &self,
        scope: &str,
        draft: &T::Create,
    ) -> Result<T, SyncError> {
        self.send(self.request(Method::POST, &T::collection_path(scope)).json(draft))
            .await
    }

    pub async fn update<T: Updatable>(
        &self,
        scope: &str,
        id: &str,
        update: &T::Update,
    ) -> Result<T, SyncError> {
        self.send(self.request(Method::PUT, &T::item_path(scope, id)).json(update))
            .await
    }

    pub async fn delete<T: Resource>(&self, scope: &str, id: &str) -> Result<(), SyncError> {
        self.send::<Option<serde_json::Value>>(self.request(Method::DELETE, &T::item_path(scope, id)))
            .await
            .map(|_| ())
    }

    /// Current store revision; a change means some write happened since.
    pub async fn revision(&self) -> Result<RevisionInfo, SyncError> {
        self.send(self.request(Method::GET, "/api/revision")).await
    }

    /// Full refetch of one trip and all of its collections.
    pub async fn snapshot(&self, trip_id: &str) -> Result<TripSnapshot, SyncError> {
        self.send(self.request(Method::GET, &format!("/api/trips/{}/snapshot", trip_id)))
            .await
    }
}

/// A projection store kept in step with the server through the REST API.
///
/// Writes are applied optimistically and reconciled with the server's answer;
/// a failed request rolls its optimistic write back.
pub struct SyncedCollection<T> {
    api: Arc<ApiClient>,
    store: Arc<ProjectionStore<T>>,
}

impl<T> Clone for SyncedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            store: self.store.clone(),
        }
    }
}

impl<T: Resource> SyncedCollection<T> {
    pub fn new(api: Arc<ApiClient>, store: Arc<ProjectionStore<T>>) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &Arc<ProjectionStore<T>> {
        &self.store
    }

    /// Fetch `scope` in full and commit it, unless the view went away first.
    ///
    /// An abandoned fetch releases its loading claim without touching the
    /// scope, so other views over the same store are unaffected.
    pub async fn load(&self, scope: &str, liveness: &Liveness) -> Result<(), SyncError> {
        self.store.begin_load(scope);
        let fetched = self.api.list::<T>(scope).await;

        if !liveness.is_alive() {
            debug!(scope, "Discarding fetch for an unmounted view");
            self.store.finish_load(scope, None);
            return Ok(());
        }

        match fetched {
            Ok(items) => {
                self.store.finish_load(scope, Some(items));
                Ok(())
            }
            Err(e) => {
                self.store.finish_load(scope, None);
                Err(e)
            }
        }
    }

    /// Create optimistically under a temporary id, then swap in the server's entity.
    ///
    /// The server publishes before it answers, so the echo usually lands
    /// first. Between the echo and the response the scope briefly holds both
    /// the `temp-` entry and the real one; the response then drops the
    /// temporary entry and the scope converges to a single entity.
    pub async fn create(&self, scope: &str, draft: T::Create) -> Result<T, SyncError> {
        let temp_id = format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4());
        let provisional = T::provisional(scope, &temp_id, self.api.user_id(), &draft);
        self.store.apply(scope, Change::Created(provisional));

        match self.api.create::<T>(scope, &draft).await {
            Ok(entity) => {
                self.store.confirm_created(scope, &temp_id, entity.clone());
                Ok(entity)
            }
            Err(e) => {
                warn!(scope, "Create failed, rolling back: {}", e);
                self.store.apply(scope, Change::Deleted(temp_id));
                Err(e)
            }
        }
    }

    /// Delete optimistically; restore the entity where it was on failure.
    pub async fn delete(&self, scope: &str, id: &str) -> Result<(), SyncError> {
        let taken = self.store.take(scope, id);

        match self.api.delete::<T>(scope, id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(scope, id, "Delete failed, rolling back: {}", e);
                if let Some((index, entity)) = taken {
                    self.store.restore(scope, index, entity);
                }
                Err(e)
            }
        }
    }
}

impl<T: Updatable> SyncedCollection<T> {
    /// Update optimistically, then apply the server's entity; revert on failure.
    pub async fn update(&self, scope: &str, id: &str, update: T::Update) -> Result<T, SyncError> {
        let previous = self.store.get(scope, id);
        if let Some(mut optimistic) = previous.clone() {
            optimistic.apply_update(&update);
            self.store.apply(scope, Change::Updated(optimistic));
        }

        match self.api.update::<T>(scope, id, &update).await {
            Ok(entity) => {
                self.store.apply(scope, Change::Updated(entity.clone()));
                Ok(entity)
            }
            Err(e) => {
                warn!(scope, id, "Update failed, rolling back: {}", e);
                if let Some(previous) = previous {
                    self.store.apply(scope, Change::Updated(previous));
                }
                Err(e)
            }
        }
    }
}
