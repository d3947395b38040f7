//! Place model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::realtime::EntityKind;

/// A point of interest scheduled within a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
    /// Local wall-clock time, `HH:MM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity for Place {
    const KIND: EntityKind = EntityKind::Place;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.trip_id)
    }
}

/// Request body for creating a new place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaceRequest {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub visit_time: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for updating an existing place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdatePlaceRequest {
    /// Apply the present fields onto `place`, leaving absent ones untouched.
    pub fn apply_to(&self, place: &mut Place) {
        if let Some(name) = &self.name {
            place.name = name.clone();
        }
        if self.address.is_some() {
            place.address = self.address.clone();
        }
        if self.latitude.is_some() {
            place.latitude = self.latitude;
        }
        if self.longitude.is_some() {
            place.longitude = self.longitude;
        }
        if self.visit_date.is_some() {
            place.visit_date = self.visit_date;
        }
        if self.visit_time.is_some() {
            place.visit_time = self.visit_time.clone();
        }
        if self.category.is_some() {
            place.category = self.category.clone();
        }
        if self.notes.is_some() {
            place.notes = self.notes.clone();
        }
    }
}
