//! Wire schema for a single change notification.
//!
//! `{ "channel": string, "type": "<kind>-<action>", "data": object }` where
//! `data` is the full entity for creates and updates and `{ "id" }` for deletes.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Channel;
use crate::models::Entity;

/// Entity kinds that travel on realtime channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Trip,
    Place,
    Accommodation,
    File,
    PlaceFile,
    Share,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Trip,
        EntityKind::Place,
        EntityKind::Accommodation,
        EntityKind::File,
        EntityKind::PlaceFile,
        EntityKind::Share,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Trip => "trip",
            EntityKind::Place => "place",
            EntityKind::Accommodation => "accommodation",
            EntityKind::File => "file",
            EntityKind::PlaceFile => "place-file",
            EntityKind::Share => "share",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

/// The mutation an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [
        MutationKind::Created,
        MutationKind::Updated,
        MutationKind::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Created => "created",
            MutationKind::Updated => "updated",
            MutationKind::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == s)
    }
}

/// Event type tag qualified by entity kind, e.g. `place-created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType {
    pub kind: EntityKind,
    pub action: MutationKind,
}

impl EventType {
    pub const fn new(kind: EntityKind, action: MutationKind) -> Self {
        Self { kind, action }
    }

    /// The three event types of one entity kind.
    pub fn all_for(kind: EntityKind) -> [EventType; 3] {
        MutationKind::ALL.map(|action| EventType::new(kind, action))
    }

    pub fn parse(s: &str) -> Option<Self> {
        // Kinds may contain '-' ("place-file"), actions never do.
        let (kind, action) = s.rsplit_once('-')?;
        Some(Self::new(EntityKind::parse(kind)?, MutationKind::parse(action)?))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.as_str(), self.action.as_str())
    }
}

impl TryFrom<String> for EventType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::parse(&value).ok_or_else(|| format!("unknown event type `{}`", value))
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.to_string()
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub channel: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Envelope for a created entity, routed by the entity's own scope.
    pub fn created<T: Entity>(entity: &T) -> Result<Self, serde_json::Error> {
        Self::with_entity(MutationKind::Created, entity)
    }

    /// Envelope for an updated entity, routed by the entity's own scope.
    pub fn updated<T: Entity>(entity: &T) -> Result<Self, serde_json::Error> {
        Self::with_entity(MutationKind::Updated, entity)
    }

    /// Envelope for a deleted entity. Only the id is carried.
    pub fn deleted<T: Entity>(scope_id: Option<&str>, id: &str) -> Self {
        Self {
            channel: Channel::route(T::KIND, scope_id.unwrap_or_default()).name(),
            event_type: EventType::new(T::KIND, MutationKind::Deleted),
            data: serde_json::json!({ "id": id }),
        }
    }

    fn with_entity<T: Entity>(action: MutationKind, entity: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            channel: Channel::route(T::KIND, entity.scope_id().unwrap_or_default()).name(),
            event_type: EventType::new(T::KIND, action),
            data: serde_json::to_value(entity)?,
        })
    }

    /// Decode an envelope from a text frame. Malformed input yields `None`.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// The id of the affected entity, if the payload carries one.
    pub fn entity_id(&self) -> Option<&str> {
        self.data.get("id").and_then(|id| id.as_str())
    }

    /// Decode the payload as a full entity representation.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
