//! Trip API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;

use super::{error, require_non_empty, require_trip, revision_after, success, ApiResult, Need};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreateTripRequest, Trip, TripSnapshot, UpdateTripRequest};
use crate::realtime::{Audience, MutationKind};
use crate::AppState;

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::Validation(
                "endDate must not be before startDate".to_string(),
            ));
        }
    }
    Ok(())
}

/// GET /api/trips - List trips visible to the caller.
pub async fn list_trips(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Trip>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_trips_for_user(&user).await {
        Ok(trips) => success(trips, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/trips/:id - Get a single trip.
pub async fn get_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Trip> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.get_trip(&id).await {
        Ok(Some(trip)) => success(trip, revision_id),
        Ok(None) => error(AppError::NotFound(format!("Trip {} not found", id)), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/trips/:id/snapshot - Full refetch of a trip's collections.
pub async fn get_trip_snapshot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<TripSnapshot> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.get_snapshot(&id).await {
        Ok(snapshot) => {
            let revision_id = snapshot.revision_id;
            success(snapshot, revision_id)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/trips - Create a new trip owned by the caller.
pub async fn create_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateTripRequest>,
) -> ApiResult<Trip> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_non_empty(&request.name, "Name")
        .and_then(|_| validate_dates(request.start_date, request.end_date))
    {
        return error(e, revision_id);
    }

    match state.repo.create_trip(&user, &request).await {
        Ok(trip) => {
            state.publisher.entity_to(
                MutationKind::Created,
                &trip,
                Audience::users([trip.owner_id.clone()]),
            );
            success(trip, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/trips/:id - Update a trip.
pub async fn update_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateTripRequest>,
) -> ApiResult<Trip> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &id, &user, Need::Own).await {
        return error(e, revision_id);
    }
    if let Some(name) = &request.name {
        if let Err(e) = require_non_empty(name, "Name") {
            return error(e, revision_id);
        }
    }

    let existing = match state.repo.get_trip(&id).await {
        Ok(Some(trip)) => trip,
        Ok(None) => {
            return error(AppError::NotFound(format!("Trip {} not found", id)), revision_id)
        }
        Err(e) => return error(e, revision_id),
    };
    let mut merged = existing;
    request.apply_to(&mut merged);
    if let Err(e) = validate_dates(merged.start_date, merged.end_date) {
        return error(e, revision_id);
    }

    match state.repo.update_trip(&id, &request).await {
        Ok(trip) => {
            let members = state.repo.trip_members(&id).await.unwrap_or_default();
            state
                .publisher
                .entity_to(MutationKind::Updated, &trip, Audience::users(members));
            success(trip, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/trips/:id - Delete a trip and everything in it.
pub async fn delete_trip(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &id, &user, Need::Own).await {
        return error(e, revision_id);
    }

    // Membership must be captured before the shares cascade away.
    let members = match state.repo.trip_members(&id).await {
        Ok(members) => members,
        Err(e) => return error(e, revision_id),
    };

    match state.repo.delete_trip(&id).await {
        Ok(()) => {
            state
                .publisher
                .deleted_to::<Trip>(None, &id, Audience::users(members));
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}
