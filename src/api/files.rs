//! Trip and place file endpoints.
//!
//! Uploads go straight to object storage; these endpoints only record the
//! resulting URL and metadata.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, require_non_empty, require_trip, revision_after, success, ApiResult, Need};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreateFileRequest, Place, PlaceFile, TripFile};
use crate::realtime::MutationKind;
use crate::AppState;

fn validate_file(request: &CreateFileRequest) -> Result<(), AppError> {
    require_non_empty(&request.file_name, "fileName")?;
    require_non_empty(&request.url, "url")?;
    if request.size_bytes.is_some_and(|size| size < 0) {
        return Err(AppError::Validation("sizeBytes must not be negative".to_string()));
    }
    Ok(())
}

/// Resolve a place and check the caller's access to its trip.
async fn require_place(
    state: &AppState,
    place_id: &str,
    user_id: &str,
    need: Need,
) -> Result<Place, AppError> {
    let place = state
        .repo
        .get_place(place_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Place {} not found", place_id)))?;
    require_trip(state, &place.trip_id, user_id, need).await?;
    Ok(place)
}

/// GET /api/trips/:trip_id/files - List a trip's files.
pub async fn list_trip_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
) -> ApiResult<Vec<TripFile>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.list_trip_files(&trip_id).await {
        Ok(files) => success(files, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/trips/:trip_id/files - Record an uploaded trip file.
pub async fn create_trip_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
    Json(request): Json<CreateFileRequest>,
) -> ApiResult<TripFile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }
    if let Err(e) = validate_file(&request) {
        return error(e, revision_id);
    }

    match state.repo.create_trip_file(&trip_id, &user, &request).await {
        Ok(file) => {
            state.publisher.entity(MutationKind::Created, &file);
            success(file, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/trips/:trip_id/files/:id - Delete a trip file.
pub async fn delete_trip_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }

    match state.repo.delete_trip_file(&trip_id, &id).await {
        Ok(()) => {
            state.publisher.deleted::<TripFile>(Some(&trip_id), &id);
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/places/:place_id/files - List a place's files.
pub async fn list_place_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(place_id): Path<String>,
) -> ApiResult<Vec<PlaceFile>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_place(&state, &place_id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.list_place_files(&place_id).await {
        Ok(files) => success(files, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/places/:place_id/files - Record an uploaded place file.
pub async fn create_place_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(place_id): Path<String>,
    Json(request): Json<CreateFileRequest>,
) -> ApiResult<PlaceFile> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let place = match require_place(&state, &place_id, &user, Need::Edit).await {
        Ok(place) => place,
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = validate_file(&request) {
        return error(e, revision_id);
    }

    match state.repo.create_place_file(&place, &user, &request).await {
        Ok(file) => {
            state.publisher.entity(MutationKind::Created, &file);
            success(file, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/places/:place_id/files/:id - Delete a place file.
pub async fn delete_place_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((place_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_place(&state, &place_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }

    match state.repo.delete_place_file(&place_id, &id).await {
        Ok(()) => {
            state.publisher.deleted::<PlaceFile>(Some(&place_id), &id);
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}
