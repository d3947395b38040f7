//! Full-refetch snapshot of a single trip.

use serde::{Deserialize, Serialize};

use super::{Accommodation, Place, Share, Trip, TripFile};

/// Everything a client needs to rebuild its projections for one trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub revision_id: i64,
    pub generated_at: String,
    pub trip: Trip,
    pub places: Vec<Place>,
    pub accommodations: Vec<Accommodation>,
    pub files: Vec<TripFile>,
    pub shares: Vec<Share>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}
