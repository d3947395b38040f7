//! Reference-counted subscription registry keyed by `(channel, eventType)`.
//!
//! Handlers are counted per pair so that one view leaving never silences
//! another view still listening on the same channel. The wire-level join is
//! tracked per channel: the first registrant joins, the last one leaves.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::realtime::{EventEnvelope, EventType};

/// Callback invoked with every envelope matching a registration.
pub type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Proof of one registration; hand it back to unsubscribe exactly that one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

struct Registration {
    channel: String,
    event_type: EventType,
    handler: Handler,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("channel", &self.channel)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_token: u64,
    registrations: BTreeMap<SubscriptionToken, Registration>,
    pairs: HashMap<(String, EventType), usize>,
    channels: HashMap<String, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns the token and whether this is the first
    /// registration on the channel.
    pub fn register(
        &mut self,
        channel: &str,
        event_type: EventType,
        handler: Handler,
    ) -> (SubscriptionToken, bool) {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;

        *self
            .pairs
            .entry((channel.to_string(), event_type))
            .or_default() += 1;
        let on_channel = self.channels.entry(channel.to_string()).or_default();
        *on_channel += 1;
        let first = *on_channel == 1;

        self.registrations.insert(
            token,
            Registration {
                channel: channel.to_string(),
                event_type,
                handler,
            },
        );
        (token, first)
    }

    /// Remove one registration. Returns its channel and whether it was the
    /// last one on that channel; `None` for an unknown or spent token.
    pub fn remove(&mut self, token: SubscriptionToken) -> Option<(String, bool)> {
        let registration = self.registrations.remove(&token)?;
        let key = (registration.channel, registration.event_type);

        if let Some(count) = self.pairs.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.pairs.remove(&key);
            }
        }

        let (channel, _) = key;
        let last = match self.channels.get_mut(&channel) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => {
                self.channels.remove(&channel);
                true
            }
        };
        Some((channel, last))
    }

    /// Number of live registrations for one `(channel, eventType)` pair.
    pub fn count(&self, channel: &str, event_type: EventType) -> usize {
        self.pairs
            .get(&(channel.to_string(), event_type))
            .copied()
            .unwrap_or(0)
    }

    /// Every channel with at least one registration, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Handlers for a pair, in registration order.
    pub fn handlers_for(&self, channel: &str, event_type: EventType) -> Vec<Handler> {
        self.registrations
            .values()
            .filter(|r| r.channel == channel && r.event_type == event_type)
            .map(|r| r.handler.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
