//! Accommodation model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::realtime::EntityKind;

/// A stay booked for part of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Accommodation {
    /// Whether the stay covers `date`, check-in and check-out days included.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date <= self.check_out
    }
}

impl Entity for Accommodation {
    const KIND: EntityKind = EntityKind::Accommodation;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.trip_id)
    }
}

/// Request body for creating a new accommodation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccommodationRequest {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub confirmation: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for updating an existing accommodation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccommodationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdateAccommodationRequest {
    /// Apply the present fields onto `stay`, leaving absent ones untouched.
    pub fn apply_to(&self, stay: &mut Accommodation) {
        if let Some(name) = &self.name {
            stay.name = name.clone();
        }
        if self.address.is_some() {
            stay.address = self.address.clone();
        }
        if let Some(check_in) = self.check_in {
            stay.check_in = check_in;
        }
        if let Some(check_out) = self.check_out {
            stay.check_out = check_out;
        }
        if self.confirmation.is_some() {
            stay.confirmation = self.confirmation.clone();
        }
        if self.notes.is_some() {
            stay.notes = self.notes.clone();
        }
    }
}
