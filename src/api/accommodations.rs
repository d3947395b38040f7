//! Accommodation API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, require_non_empty, require_trip, revision_after, success, ApiResult, Need};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{Accommodation, CreateAccommodationRequest, UpdateAccommodationRequest};
use crate::realtime::MutationKind;
use crate::AppState;

/// GET /api/trips/:trip_id/accommodations - List a trip's accommodations.
pub async fn list_accommodations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
) -> ApiResult<Vec<Accommodation>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.list_accommodations(&trip_id).await {
        Ok(stays) => success(stays, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/trips/:trip_id/accommodations - Create an accommodation.
pub async fn create_accommodation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
    Json(request): Json<CreateAccommodationRequest>,
) -> ApiResult<Accommodation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }
    if let Err(e) = require_non_empty(&request.name, "Name") {
        return error(e, revision_id);
    }
    if request.check_out < request.check_in {
        return error(
            AppError::Validation("checkOut must not be before checkIn".to_string()),
            revision_id,
        );
    }

    match state.repo.create_accommodation(&trip_id, &request).await {
        Ok(stay) => {
            state.publisher.entity(MutationKind::Created, &stay);
            success(stay, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/trips/:trip_id/accommodations/:id - Update an accommodation.
pub async fn update_accommodation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
    Json(request): Json<UpdateAccommodationRequest>,
) -> ApiResult<Accommodation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }
    if let Some(name) = &request.name {
        if let Err(e) = require_non_empty(name, "Name") {
            return error(e, revision_id);
        }
    }

    match state
        .repo
        .update_accommodation(&trip_id, &id, &request)
        .await
    {
        Ok(stay) => {
            state.publisher.entity(MutationKind::Updated, &stay);
            success(stay, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/trips/:trip_id/accommodations/:id - Delete an accommodation.
pub async fn delete_accommodation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }

    match state.repo.delete_accommodation(&trip_id, &id).await {
        Ok(()) => {
            state
                .publisher
                .deleted::<Accommodation>(Some(&trip_id), &id);
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}
