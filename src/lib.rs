//! Tripsync
//!
//! Real-time synchronization for collaborative trip planning: a REST backend
//! with SQLite persistence that publishes every committed mutation to
//! WebSocket subscribers, and a client engine that keeps local projections
//! of trip collections converged with the server.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod realtime;
pub mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;
use realtime::Publisher;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub publisher: Publisher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Repository, config: Config) -> Self {
        Self {
            repo: Arc::new(repo),
            publisher: Publisher::new(config.event_buffer),
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Trips
        .route("/trips", get(api::list_trips).post(api::create_trip))
        .route(
            "/trips/{id}",
            get(api::get_trip).put(api::update_trip).delete(api::delete_trip),
        )
        .route("/trips/{id}/snapshot", get(api::get_trip_snapshot))
        // Places
        .route("/trips/{id}/places", get(api::list_places).post(api::create_place))
        .route(
            "/trips/{id}/places/{place_id}",
            put(api::update_place).delete(api::delete_place),
        )
        // Accommodations
        .route(
            "/trips/{id}/accommodations",
            get(api::list_accommodations).post(api::create_accommodation),
        )
        .route(
            "/trips/{id}/accommodations/{accommodation_id}",
            put(api::update_accommodation).delete(api::delete_accommodation),
        )
        // Trip files
        .route("/trips/{id}/files", get(api::list_trip_files).post(api::create_trip_file))
        .route("/trips/{id}/files/{file_id}", delete(api::delete_trip_file))
        // Place files
        .route(
            "/places/{place_id}/files",
            get(api::list_place_files).post(api::create_place_file),
        )
        .route("/places/{place_id}/files/{file_id}", delete(api::delete_place_file))
        // Shares
        .route("/trips/{id}/shares", get(api::list_shares).post(api::create_share))
        .route("/trips/{id}/shares/{share_id}", delete(api::delete_share))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check and realtime endpoint; the socket authenticates with its first frame
    let open_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(realtime::ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .merge(open_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
