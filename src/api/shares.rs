//! Collaborator share endpoints.
//!
//! Besides the share event itself, granting or revoking access tells the
//! affected user's trip list about the change on the `trips` channel.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, require_non_empty, require_trip, revision_after, success, ApiResult, Need};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreateShareRequest, Share, Trip};
use crate::realtime::{Audience, MutationKind};
use crate::AppState;

/// GET /api/trips/:trip_id/shares - List a trip's collaborators.
pub async fn list_shares(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
) -> ApiResult<Vec<Share>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.list_shares(&trip_id).await {
        Ok(shares) => success(shares, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/trips/:trip_id/shares - Share a trip with another user.
pub async fn create_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
    Json(request): Json<CreateShareRequest>,
) -> ApiResult<Share> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Own).await {
        return error(e, revision_id);
    }
    if let Err(e) = require_non_empty(&request.user_id, "userId") {
        return error(e, revision_id);
    }
    if request.user_id == user {
        return error(
            AppError::Validation("A trip cannot be shared with its owner".to_string()),
            revision_id,
        );
    }

    match state.repo.create_share(&trip_id, &request).await {
        Ok(share) => {
            state.publisher.entity(MutationKind::Created, &share);
            match state.repo.get_trip(&trip_id).await {
                Ok(Some(trip)) => state.publisher.entity_to(
                    MutationKind::Created,
                    &trip,
                    Audience::users([share.user_id.clone()]),
                ),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to announce shared trip {}: {}", trip_id, e),
            }
            success(share, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/trips/:trip_id/shares/:id - Revoke a collaborator.
pub async fn delete_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Own).await {
        return error(e, revision_id);
    }

    match state.repo.delete_share(&trip_id, &id).await {
        Ok(share) => {
            state.publisher.deleted::<Share>(Some(&trip_id), &id);
            state.publisher.deleted_to::<Trip>(
                None,
                &trip_id,
                Audience::users([share.user_id.clone()]),
            );
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}
