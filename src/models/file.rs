//! Uploaded file metadata attached to trips and places.
//!
//! The bytes live in object storage; only the stable URL and descriptive
//! metadata are stored and carried in event payloads.

use serde::{Deserialize, Serialize};

use super::Entity;
use crate::realtime::EntityKind;

/// A file attached to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFile {
    pub id: String,
    pub trip_id: String,
    pub file_name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub uploaded_by: String,
    pub created_at: String,
}

impl Entity for TripFile {
    const KIND: EntityKind = EntityKind::File;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.trip_id)
    }
}

/// A file attached to a single place. Scoped by place, not by trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceFile {
    pub id: String,
    pub place_id: String,
    pub trip_id: String,
    pub file_name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub uploaded_by: String,
    pub created_at: String,
}

impl Entity for PlaceFile {
    const KIND: EntityKind = EntityKind::PlaceFile;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.place_id)
    }
}

/// Request body for registering an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}
