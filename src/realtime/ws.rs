//! WebSocket endpoint fanning published events out to subscribed clients.
//!
//! A session must authenticate before joining channels. Each join is
//! authorised against the trip the channel belongs to, and every event is
//! additionally filtered by the publisher's audience.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::{Channel, ClientFrame, EntityKind, EventType, MutationKind, Published, ServerFrame};
use crate::auth;
use crate::errors::{codes, AppError};
use crate::AppState;

/// GET /ws - Upgrade to a realtime session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.publisher.subscribe();
    let mut session = Session::default();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Realtime socket error: {}", e);
                        break;
                    }
                };
                if let Some(reply) = session.handle_text(text.as_str(), &state).await {
                    if send_frame(&mut sink, &reply).await.is_err() {
                        break;
                    }
                }
            }
            published = events.recv() => {
                match published {
                    Ok(item) => {
                        session.observe(&item);
                        if !session.admits(&item) {
                            continue;
                        }
                        if sink.send(Message::Text(item.frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(user = ?session.user_id, missed, "Realtime session lagged behind publisher");
                        if send_frame(&mut sink, &ServerFrame::Lagged { missed }).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(user = ?session.user_id, channels = session.channels.len(), "Realtime session closed");
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}

/// Per-connection state. Joined channels map to the trip that authorised
/// them; `trips` itself maps to `None`.
#[derive(Debug, Default)]
struct Session {
    user_id: Option<String>,
    channels: HashMap<String, Option<String>>,
}

impl Session {
    async fn handle_text(&mut self, text: &str, state: &AppState) -> Option<ServerFrame> {
        let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
            return Some(ServerFrame::error(codes::BAD_REQUEST, "Malformed frame"));
        };

        match frame {
            ClientFrame::Auth { token, user_id } => {
                if !auth::token_matches(state.config.api_psk.as_deref(), token.as_deref()) {
                    return Some(ServerFrame::error(codes::UNAUTHORIZED, "Invalid API key"));
                }
                let user_id = user_id.trim().to_string();
                if user_id.is_empty() {
                    return Some(ServerFrame::error(codes::UNAUTHORIZED, "userId is required"));
                }
                debug!(user = %user_id, "Realtime session authenticated");
                self.user_id = Some(user_id.clone());
                Some(ServerFrame::Authenticated { user_id })
            }
            ClientFrame::Subscribe { channel } => {
                let Some(user_id) = self.user_id.clone() else {
                    return Some(ServerFrame::error(codes::UNAUTHORIZED, "Authenticate first"));
                };
                let Some(parsed) = Channel::parse(&channel) else {
                    return Some(ServerFrame::error(
                        codes::BAD_REQUEST,
                        format!("Unknown channel {}", channel),
                    ));
                };
                match authorize(state, &user_id, &parsed).await {
                    Ok(trip_id) => {
                        self.channels.insert(channel.clone(), trip_id);
                        Some(ServerFrame::Subscribed { channel })
                    }
                    Err(e) => Some(ServerFrame::error(e.error_code(), e.message())),
                }
            }
            ClientFrame::Unsubscribe { channel } => {
                self.channels.remove(&channel);
                None
            }
        }
    }

    fn admits(&self, item: &Published) -> bool {
        let Some(user_id) = &self.user_id else {
            return false;
        };
        self.channels.contains_key(&item.channel) && item.audience.admits(user_id)
    }

    /// A trip this session can no longer see takes its scoped channels with it.
    ///
    /// Runs for every `trip-deleted` addressed to this user, whether or not
    /// the session joined `trips`.
    fn observe(&mut self, item: &Published) {
        if item.event_type != EventType::new(EntityKind::Trip, MutationKind::Deleted) {
            return;
        }
        let (Some(user_id), Some(trip_id)) = (&self.user_id, &item.entity_id) else {
            return;
        };
        if !item.audience.admits(user_id) {
            return;
        }
        let before = self.channels.len();
        self.channels
            .retain(|_, scope| scope.as_deref() != Some(trip_id.as_str()));
        if self.channels.len() != before {
            debug!(user = %user_id, trip = %trip_id, "Dropped channels of an inaccessible trip");
        }
    }
}

/// Check a join and resolve the trip the channel belongs to.
async fn authorize(
    state: &AppState,
    user_id: &str,
    channel: &Channel,
) -> Result<Option<String>, AppError> {
    let trip_id = match channel {
        Channel::Trips => return Ok(None),
        Channel::PlaceFiles(place_id) => state
            .repo
            .get_place(place_id)
            .await?
            .map(|place| place.trip_id)
            .ok_or_else(|| AppError::NotFound(format!("Place {} not found", place_id)))?,
        other => other.scope_id().unwrap_or_default().to_string(),
    };

    match state.repo.trip_access(&trip_id, user_id).await? {
        Some(_) => Ok(Some(trip_id)),
        None => Err(AppError::Forbidden(format!(
            "No access to channel {}",
            channel
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::Audience;
    use std::sync::Arc;

    fn published(
        channel: &str,
        kind: EntityKind,
        action: MutationKind,
        id: &str,
        audience: Audience,
    ) -> Published {
        Published {
            channel: channel.to_string(),
            event_type: EventType::new(kind, action),
            entity_id: Some(id.to_string()),
            frame: Arc::from("{}"),
            audience,
        }
    }

    #[test]
    fn test_admits_requires_auth_channel_and_audience() {
        let mut session = Session::default();
        let item = published(
            "places:t1",
            EntityKind::Place,
            MutationKind::Created,
            "p1",
            Audience::Channel,
        );
        session.channels.insert("places:t1".into(), Some("t1".into()));
        assert!(!session.admits(&item));

        session.user_id = Some("alice".into());
        assert!(session.admits(&item));

        let other = published(
            "places:t2",
            EntityKind::Place,
            MutationKind::Created,
            "p2",
            Audience::Channel,
        );
        assert!(!session.admits(&other));

        session.channels.insert("trips".into(), None);
        let private = published(
            "trips",
            EntityKind::Trip,
            MutationKind::Created,
            "t9",
            Audience::users(["bob"]),
        );
        assert!(!session.admits(&private));
    }

    fn session(user: &str, joined: &[(&str, Option<&str>)]) -> Session {
        Session {
            user_id: Some(user.into()),
            channels: joined
                .iter()
                .map(|(name, trip)| (name.to_string(), trip.map(String::from)))
                .collect(),
        }
    }

    fn remaining(session: &Session) -> Vec<String> {
        let mut names: Vec<_> = session.channels.keys().cloned().collect();
        names.sort();
        names
    }

    #[test]
    fn test_trip_deletion_drops_scoped_channels() {
        let mut session = session(
            "bob",
            &[
                ("trips", None),
                ("places:t1", Some("t1")),
                ("accommodations:t1", Some("t1")),
                ("places:t2", Some("t2")),
                ("place-files:p1", Some("t1")),
                ("place-files:p2", Some("t2")),
            ],
        );
        let revoked = published(
            "trips",
            EntityKind::Trip,
            MutationKind::Deleted,
            "t1",
            Audience::users(["bob"]),
        );
        session.observe(&revoked);

        assert_eq!(remaining(&session), vec!["place-files:p2", "places:t2", "trips"]);
    }

    #[test]
    fn test_revocation_applies_without_trips_channel() {
        let mut session = session("bob", &[("places:t1", Some("t1"))]);
        let revoked = published(
            "trips",
            EntityKind::Trip,
            MutationKind::Deleted,
            "t1",
            Audience::users(["bob"]),
        );
        assert!(!session.admits(&revoked));
        session.observe(&revoked);
        assert!(session.channels.is_empty());

        let later = published(
            "places:t1",
            EntityKind::Place,
            MutationKind::Created,
            "p1",
            Audience::Channel,
        );
        assert!(!session.admits(&later));
    }

    #[test]
    fn test_revocation_for_another_user_is_ignored() {
        let mut session = session("carol", &[("places:t1", Some("t1"))]);
        let revoked = published(
            "trips",
            EntityKind::Trip,
            MutationKind::Deleted,
            "t1",
            Audience::users(["bob"]),
        );
        session.observe(&revoked);
        assert_eq!(remaining(&session), vec!["places:t1"]);
    }
}
