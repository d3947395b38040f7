//! REST addressing and optimistic drafts for each mirrored entity kind.

use chrono::Utc;
use serde::Serialize;

use crate::models::{
    Accommodation, CreateAccommodationRequest, CreateFileRequest, CreatePlaceRequest,
    CreateShareRequest, CreateTripRequest, Entity, Place, PlaceFile, Share, Trip, TripFile,
    UpdateAccommodationRequest, UpdatePlaceRequest, UpdateTripRequest,
};

/// An entity kind reachable through the REST API.
pub trait Resource: Entity {
    type Create: Serialize + Send + Sync;

    /// Collection path for `scope` (ignored by unscoped kinds).
    fn collection_path(scope: &str) -> String;

    fn item_path(scope: &str, id: &str) -> String {
        format!("{}/{}", Self::collection_path(scope), id)
    }

    /// Local stand-in shown until the server confirms the create.
    fn provisional(scope: &str, id: &str, user_id: &str, draft: &Self::Create) -> Self;
}

/// A resource that supports partial updates.
pub trait Updatable: Resource {
    type Update: Serialize + Send + Sync;

    fn apply_update(&mut self, update: &Self::Update);
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Resource for Trip {
    type Create = CreateTripRequest;

    fn collection_path(_scope: &str) -> String {
        "/api/trips".to_string()
    }

    fn provisional(_scope: &str, id: &str, user_id: &str, draft: &CreateTripRequest) -> Self {
        Trip {
            id: id.to_string(),
            owner_id: user_id.to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl Updatable for Trip {
    type Update = UpdateTripRequest;

    fn apply_update(&mut self, update: &UpdateTripRequest) {
        update.apply_to(self);
    }
}

impl Resource for Place {
    type Create = CreatePlaceRequest;

    fn collection_path(scope: &str) -> String {
        format!("/api/trips/{}/places", scope)
    }

    fn provisional(scope: &str, id: &str, _user_id: &str, draft: &CreatePlaceRequest) -> Self {
        Place {
            id: id.to_string(),
            trip_id: scope.to_string(),
            name: draft.name.clone(),
            address: draft.address.clone(),
            latitude: draft.latitude,
            longitude: draft.longitude,
            visit_date: draft.visit_date,
            visit_time: draft.visit_time.clone(),
            category: draft.category.clone(),
            notes: draft.notes.clone(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl Updatable for Place {
    type Update = UpdatePlaceRequest;

    fn apply_update(&mut self, update: &UpdatePlaceRequest) {
        update.apply_to(self);
    }
}

impl Resource for Accommodation {
    type Create = CreateAccommodationRequest;

    fn collection_path(scope: &str) -> String {
        format!("/api/trips/{}/accommodations", scope)
    }

    fn provisional(
        scope: &str,
        id: &str,
        _user_id: &str,
        draft: &CreateAccommodationRequest,
    ) -> Self {
        Accommodation {
            id: id.to_string(),
            trip_id: scope.to_string(),
            name: draft.name.clone(),
            address: draft.address.clone(),
            check_in: draft.check_in,
            check_out: draft.check_out,
            confirmation: draft.confirmation.clone(),
            notes: draft.notes.clone(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl Updatable for Accommodation {
    type Update = UpdateAccommodationRequest;

    fn apply_update(&mut self, update: &UpdateAccommodationRequest) {
        update.apply_to(self);
    }
}

impl Resource for TripFile {
    type Create = CreateFileRequest;

    fn collection_path(scope: &str) -> String {
        format!("/api/trips/{}/files", scope)
    }

    fn provisional(scope: &str, id: &str, user_id: &str, draft: &CreateFileRequest) -> Self {
        TripFile {
            id: id.to_string(),
            trip_id: scope.to_string(),
            file_name: draft.file_name.clone(),
            url: draft.url.clone(),
            content_type: draft.content_type.clone(),
            size_bytes: draft.size_bytes,
            uploaded_by: user_id.to_string(),
            created_at: now(),
        }
    }
}

impl Resource for PlaceFile {
    type Create = CreateFileRequest;

    fn collection_path(scope: &str) -> String {
        format!("/api/places/{}/files", scope)
    }

    fn provisional(scope: &str, id: &str, user_id: &str, draft: &CreateFileRequest) -> Self {
        PlaceFile {
            id: id.to_string(),
            place_id: scope.to_string(),
            // Filled in by the server response.
            trip_id: String::new(),
            file_name: draft.file_name.clone(),
            url: draft.url.clone(),
            content_type: draft.content_type.clone(),
            size_bytes: draft.size_bytes,
            uploaded_by: user_id.to_string(),
            created_at: now(),
        }
    }
}

impl Resource for Share {
    type Create = CreateShareRequest;

    fn collection_path(scope: &str) -> String {
        format!("/api/trips/{}/shares", scope)
    }

    fn provisional(scope: &str, id: &str, _user_id: &str, draft: &CreateShareRequest) -> Self {
        Share {
            id: id.to_string(),
            trip_id: scope.to_string(),
            user_id: draft.user_id.clone(),
            role: draft.role,
            created_at: now(),
        }
    }
}
