//! Collaborator share model.

use serde::{Deserialize, Serialize};

use super::Entity;
use crate::realtime::EntityKind;

/// What a collaborator may do with a shared trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Viewer,
    Editor,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Viewer => "viewer",
            ShareRole::Editor => "editor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(ShareRole::Viewer),
            "editor" => Some(ShareRole::Editor),
            _ => None,
        }
    }
}

/// Grants a user access to a trip they do not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub id: String,
    pub trip_id: String,
    pub user_id: String,
    pub role: ShareRole,
    pub created_at: String,
}

impl Entity for Share {
    const KIND: EntityKind = EntityKind::Share;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.trip_id)
    }
}

/// Request body for sharing a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub user_id: String,
    #[serde(default = "default_role")]
    pub role: ShareRole,
}

fn default_role() -> ShareRole {
    ShareRole::Editor
}
