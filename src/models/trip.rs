//! Trip model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::realtime::EntityKind;

/// A trip owned by one user and optionally shared with collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity for Trip {
    const KIND: EntityKind = EntityKind::Trip;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        None
    }
}

/// Request body for creating a new trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Request body for updating an existing trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTripRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl UpdateTripRequest {
    /// Apply the present fields onto `trip`, leaving absent ones untouched.
    pub fn apply_to(&self, trip: &mut Trip) {
        if let Some(name) = &self.name {
            trip.name = name.clone();
        }
        if self.description.is_some() {
            trip.description = self.description.clone();
        }
        if self.start_date.is_some() {
            trip.start_date = self.start_date;
        }
        if self.end_date.is_some() {
            trip.end_date = self.end_date;
        }
    }
}
