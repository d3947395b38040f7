//! Publisher hook invoked after every committed mutation.
//!
//! Publishing is fire-and-forget: failures are logged and swallowed so the
//! mutation's HTTP result never depends on notification fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::{EventEnvelope, EventType, MutationKind};
use crate::models::Entity;

/// Who may receive a published event besides being joined to its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every session joined to the channel.
    Channel,
    /// Only sessions authenticated as one of these users.
    Users(HashSet<String>),
}

impl Audience {
    pub fn users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Audience::Users(users.into_iter().map(Into::into).collect())
    }

    pub fn admits(&self, user_id: &str) -> bool {
        match self {
            Audience::Channel => true,
            Audience::Users(users) => users.contains(user_id),
        }
    }
}

/// An envelope on its way to the WebSocket sessions, serialized once.
#[derive(Debug, Clone)]
pub struct Published {
    pub channel: String,
    pub event_type: EventType,
    pub entity_id: Option<String>,
    pub frame: Arc<str>,
    pub audience: Audience,
}

/// In-process fan-out hub feeding every connected WebSocket session.
#[derive(Clone)]
pub struct Publisher {
    sender: broadcast::Sender<Published>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.sender.subscribe()
    }

    /// Emit one envelope. Never fails.
    pub fn publish(&self, envelope: EventEnvelope, audience: Audience) {
        let frame = match serde_json::to_string(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    channel = %envelope.channel,
                    event = %envelope.event_type,
                    "Failed to serialize event: {}",
                    e
                );
                return;
            }
        };

        let published = Published {
            entity_id: envelope.entity_id().map(str::to_string),
            channel: envelope.channel,
            event_type: envelope.event_type,
            frame: Arc::from(frame),
            audience,
        };

        tracing::debug!(channel = %published.channel, event = %published.event_type, "Publishing event");
        if self.sender.send(published).is_err() {
            tracing::debug!("No realtime sessions connected; event dropped");
        }
    }

    /// Publish a created or updated entity to everyone on its channel.
    pub fn entity<T: Entity>(&self, action: MutationKind, entity: &T) {
        self.entity_to(action, entity, Audience::Channel);
    }

    /// Publish a created or updated entity to a restricted audience.
    pub fn entity_to<T: Entity>(&self, action: MutationKind, entity: &T, audience: Audience) {
        let envelope = match action {
            MutationKind::Created => EventEnvelope::created(entity),
            MutationKind::Updated => EventEnvelope::updated(entity),
            MutationKind::Deleted => {
                return self.deleted_to::<T>(entity.scope_id(), entity.id(), audience);
            }
        };
        match envelope {
            Ok(envelope) => self.publish(envelope, audience),
            Err(e) => tracing::warn!(
                kind = T::KIND.as_str(),
                id = entity.id(),
                "Failed to encode entity for publish: {}",
                e
            ),
        }
    }

    /// Publish a delete to everyone on the entity's channel.
    pub fn deleted<T: Entity>(&self, scope_id: Option<&str>, id: &str) {
        self.deleted_to::<T>(scope_id, id, Audience::Channel);
    }

    pub fn deleted_to<T: Entity>(&self, scope_id: Option<&str>, id: &str, audience: Audience) {
        self.publish(EventEnvelope::deleted::<T>(scope_id, id), audience);
    }
}
