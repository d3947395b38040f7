//! Applies change events to a scoped collection.
//!
//! Every rule is idempotent: a `created` for a known id, or an `updated` or
//! `deleted` for an unknown one, is a no-op. Concurrent updates for the same
//! id resolve to whichever was applied last; there is no version check.

use tracing::debug;

use super::ProjectionStore;
use crate::models::Entity;
use crate::realtime::{EventEnvelope, MutationKind};

/// A change to one entity, from the wire or from a local optimistic write.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Created(T),
    Updated(T),
    Deleted(String),
}

impl<T: Entity> Change<T> {
    /// Decode an envelope for entity kind `T`. Envelopes of another kind or
    /// with an undecodable payload yield `None`.
    pub fn from_envelope(envelope: &EventEnvelope) -> Option<Self> {
        if envelope.event_type.kind != T::KIND {
            return None;
        }
        let change = match envelope.event_type.action {
            MutationKind::Created => envelope.payload().map(Change::Created),
            MutationKind::Updated => envelope.payload().map(Change::Updated),
            MutationKind::Deleted => {
                return envelope
                    .entity_id()
                    .map(|id| Change::Deleted(id.to_string()));
            }
        };
        change
            .map_err(|e| debug!(channel = %envelope.channel, "Dropping malformed payload: {}", e))
            .ok()
    }

    pub fn id(&self) -> &str {
        match self {
            Change::Created(entity) | Change::Updated(entity) => entity.id(),
            Change::Deleted(id) => id,
        }
    }
}

/// What an apply did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::Ignored)
    }
}

/// Apply one change to an ordered collection.
pub fn apply<T: Entity>(items: &mut Vec<T>, change: Change<T>) -> Outcome {
    let position = items.iter().position(|item| item.id() == change.id());
    match (change, position) {
        (Change::Created(entity), None) => {
            items.push(entity);
            Outcome::Inserted
        }
        (Change::Updated(entity), Some(index)) => {
            items[index] = entity;
            Outcome::Replaced
        }
        (Change::Deleted(_), Some(index)) => {
            items.remove(index);
            Outcome::Removed
        }
        (Change::Created(_), Some(_)) | (Change::Updated(_), None) | (Change::Deleted(_), None) => {
            Outcome::Ignored
        }
    }
}

/// Decode `envelope` and apply it to `scope` of `store`.
pub fn apply_envelope<T: Entity>(
    store: &ProjectionStore<T>,
    scope: &str,
    envelope: &EventEnvelope,
) -> Outcome {
    match Change::from_envelope(envelope) {
        Some(change) => store.apply(scope, change),
        None => Outcome::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Accommodation, Place};
    use crate::realtime::EventType;

    fn place(id: &str, name: &str) -> Place {
        Place {
            id: id.to_string(),
            trip_id: "t1".to_string(),
            name: name.to_string(),
            address: None,
            latitude: None,
            longitude: None,
            visit_date: None,
            visit_time: None,
            category: None,
            notes: None,
            created_at: "2026-03-01T09:00:00Z".to_string(),
            updated_at: "2026-03-01T09:00:00Z".to_string(),
        }
    }

    fn stay(id: &str, notes: &str) -> Accommodation {
        Accommodation {
            id: id.to_string(),
            trip_id: "t1".to_string(),
            name: "Hotel Lutetia".to_string(),
            address: None,
            check_in: "2026-03-01".parse().unwrap(),
            check_out: "2026-03-04".parse().unwrap(),
            confirmation: None,
            notes: Some(notes.to_string()),
            created_at: "2026-03-01T09:00:00Z".to_string(),
            updated_at: "2026-03-01T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_created_and_updated_are_idempotent() {
        let mut once = Vec::new();
        apply(&mut once, Change::Created(place("p1", "Louvre")));
        apply(&mut once, Change::Updated(place("p1", "Musee du Louvre")));

        let mut twice = Vec::new();
        assert_eq!(apply(&mut twice, Change::Created(place("p1", "Louvre"))), Outcome::Inserted);
        assert_eq!(apply(&mut twice, Change::Created(place("p1", "Louvre"))), Outcome::Ignored);
        apply(&mut twice, Change::Updated(place("p1", "Musee du Louvre")));
        apply(&mut twice, Change::Updated(place("p1", "Musee du Louvre")));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_delete_then_stale_update_stays_deleted() {
        let mut items = vec![place("p1", "Louvre"), place("p2", "Orsay")];
        assert_eq!(apply(&mut items, Change::Deleted("p1".into())), Outcome::Removed);
        assert_eq!(apply(&mut items, Change::Updated(place("p1", "Louvre (late)"))), Outcome::Ignored);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p2");
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut items = vec![place("p1", "Louvre"), place("p2", "Orsay"), place("p3", "Pompidou")];
        apply(&mut items, Change::Updated(place("p2", "Musee d'Orsay")));

        let names: Vec<&str> = items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Louvre", "Musee d'Orsay", "Pompidou"]);
    }

    #[test]
    fn test_out_of_order_updates_last_applied_wins() {
        // V1 was sent first but arrives second.
        let mut items = vec![stay("a1", "V0")];
        apply(&mut items, Change::Updated(stay("a1", "V2")));
        apply(&mut items, Change::Updated(stay("a1", "V1")));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].notes.as_deref(), Some("V1"));
    }

    #[test]
    fn test_delete_of_unknown_id_is_noop() {
        let mut items = vec![place("p1", "Louvre")];
        let before = items.clone();
        assert_eq!(apply(&mut items, Change::Deleted("p9".into())), Outcome::Ignored);
        assert_eq!(items, before);
    }

    #[test]
    fn test_from_envelope_filters_kind_and_malformed() {
        let created = EventEnvelope::created(&place("p1", "Louvre")).unwrap();
        assert_eq!(
            Change::<Place>::from_envelope(&created),
            Some(Change::Created(place("p1", "Louvre")))
        );
        assert_eq!(Change::<Accommodation>::from_envelope(&created), None);

        let malformed = EventEnvelope {
            channel: "places:t1".into(),
            event_type: EventType::new(crate::realtime::EntityKind::Place, MutationKind::Updated),
            data: serde_json::json!({ "id": "p1" }),
        };
        assert_eq!(Change::<Place>::from_envelope(&malformed), None);

        let deleted = EventEnvelope::deleted::<Place>(Some("t1"), "p1");
        assert_eq!(
            Change::<Place>::from_envelope(&deleted),
            Some(Change::Deleted("p1".into()))
        );
    }
}
