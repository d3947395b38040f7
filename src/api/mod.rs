//! REST API module.
//!
//! Every handler that commits a mutation invokes the publisher afterwards;
//! the response never depends on whether the notification went out.

mod accommodations;
mod files;
mod places;
mod revision;
mod shares;
mod trips;

pub use accommodations::*;
pub use files::*;
pub use places::*;
pub use revision::*;
pub use shares::*;
pub use trips::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::TripAccess;
use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// What a handler needs the caller to be allowed to do with a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Need {
    View,
    Edit,
    Own,
}

/// Resolve the caller's access to a trip, failing if it is insufficient.
///
/// Trips the caller cannot see at all are reported as not found.
pub(crate) async fn require_trip(
    state: &AppState,
    trip_id: &str,
    user_id: &str,
    need: Need,
) -> Result<TripAccess, AppError> {
    let access = state
        .repo
        .trip_access(trip_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", trip_id)))?;

    match need {
        Need::View => Ok(access),
        Need::Edit if access.can_edit() => Ok(access),
        Need::Own if access.is_owner() => Ok(access),
        Need::Edit => Err(AppError::Forbidden(
            "Editor access to this trip is required".to_string(),
        )),
        Need::Own => Err(AppError::Forbidden(
            "Only the trip owner may do this".to_string(),
        )),
    }
}

/// Revision after a committed write, falling back to the pre-write value.
pub(crate) async fn revision_after(state: &AppState, fallback: i64) -> i64 {
    state.repo.get_revision_id().await.unwrap_or(fallback)
}

pub(crate) fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
