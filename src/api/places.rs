//! Place API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveTime;

use super::{error, require_non_empty, require_trip, revision_after, success, ApiResult, Need};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreatePlaceRequest, Place, UpdatePlaceRequest};
use crate::realtime::MutationKind;
use crate::AppState;

fn validate_place(place: &Place) -> Result<(), AppError> {
    require_non_empty(&place.name, "Name")?;
    if let Some(time) = &place.visit_time {
        if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
            return Err(AppError::Validation(format!(
                "visitTime `{}` must be HH:MM",
                time
            )));
        }
    }
    if place.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(AppError::Validation("latitude out of range".to_string()));
    }
    if place
        .longitude
        .is_some_and(|lon| !(-180.0..=180.0).contains(&lon))
    {
        return Err(AppError::Validation("longitude out of range".to_string()));
    }
    Ok(())
}

fn draft_from(trip_id: &str, request: &CreatePlaceRequest) -> Place {
    Place {
        id: String::new(),
        trip_id: trip_id.to_string(),
        name: request.name.clone(),
        address: request.address.clone(),
        latitude: request.latitude,
        longitude: request.longitude,
        visit_date: request.visit_date,
        visit_time: request.visit_time.clone(),
        category: request.category.clone(),
        notes: request.notes.clone(),
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// GET /api/trips/:trip_id/places - List a trip's places.
pub async fn list_places(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
) -> ApiResult<Vec<Place>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::View).await {
        return error(e, revision_id);
    }

    match state.repo.list_places(&trip_id).await {
        Ok(places) => success(places, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/trips/:trip_id/places - Create a place.
pub async fn create_place(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trip_id): Path<String>,
    Json(request): Json<CreatePlaceRequest>,
) -> ApiResult<Place> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }
    if let Err(e) = validate_place(&draft_from(&trip_id, &request)) {
        return error(e, revision_id);
    }

    match state.repo.create_place(&trip_id, &request).await {
        Ok(place) => {
            state.publisher.entity(MutationKind::Created, &place);
            success(place, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/trips/:trip_id/places/:id - Update a place.
pub async fn update_place(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
    Json(request): Json<UpdatePlaceRequest>,
) -> ApiResult<Place> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }

    match state.repo.get_place(&id).await {
        Ok(Some(mut merged)) if merged.trip_id == trip_id => {
            request.apply_to(&mut merged);
            if let Err(e) = validate_place(&merged) {
                return error(e, revision_id);
            }
        }
        Ok(_) => return error(AppError::NotFound(format!("Place {} not found", id)), revision_id),
        Err(e) => return error(e, revision_id),
    }

    match state.repo.update_place(&trip_id, &id, &request).await {
        Ok(place) => {
            state.publisher.entity(MutationKind::Updated, &place);
            success(place, revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/trips/:trip_id/places/:id - Delete a place.
pub async fn delete_place(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((trip_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_trip(&state, &trip_id, &user, Need::Edit).await {
        return error(e, revision_id);
    }

    match state.repo.delete_place(&trip_id, &id).await {
        Ok(()) => {
            state.publisher.deleted::<Place>(Some(&trip_id), &id);
            success((), revision_after(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_place() {
        let mut place = draft_from(
            "t1",
            &CreatePlaceRequest {
                name: "Sagrada Familia".into(),
                visit_time: Some("09:30".into()),
                latitude: Some(41.4036),
                longitude: Some(2.1744),
                ..Default::default()
            },
        );
        assert!(validate_place(&place).is_ok());

        place.visit_time = Some("9.30am".into());
        assert!(validate_place(&place).is_err());

        place.visit_time = None;
        place.latitude = Some(91.0);
        assert!(validate_place(&place).is_err());

        place.latitude = None;
        place.name = "  ".into();
        assert!(validate_place(&place).is_err());
    }
}
