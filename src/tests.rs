//! Integration tests for the tripsync server and sync client.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use once_cell::sync::Lazy;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{ClientConfig, Config, LogFormat};
use crate::db::{init_database, Repository};
use crate::models::{Accommodation, CreatePlaceRequest, Place, Trip, UpdateAccommodationRequest};
use crate::sync::{
    ApiClient, ConnectionState, ProjectionStore, SubscriptionManager, SyncContext,
    SyncedCollection, UNSCOPED,
};
use crate::{create_router, AppState};

const PSK: &str = "test-api-key";

/// Route server and client logs through the test harness once per binary.
static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
});

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    psk: Option<String>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(PSK.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        Lazy::force(&TRACING);
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            event_buffer: 256,
        };

        let state = AppState::new(Repository::new(pool), config);
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = &psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            psk,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, user: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("x-user-id", user)
    }

    async fn create_trip(&self, user: &str, name: &str) -> Value {
        let resp = self
            .request(Method::POST, "/api/trips", user)
            .json(&json!({ "name": name, "startDate": "2026-03-01", "endDate": "2026-03-05" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json::<Value>().await.unwrap()["data"].clone()
    }

    async fn share(&self, owner: &str, trip_id: &str, user: &str, role: &str) -> Value {
        let resp = self
            .request(Method::POST, &format!("/api/trips/{}/shares", trip_id), owner)
            .json(&json!({ "userId": user, "role": role }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json::<Value>().await.unwrap()["data"].clone()
    }

    async fn create_place(&self, user: &str, trip_id: &str, name: &str) -> reqwest::Response {
        self.request(Method::POST, &format!("/api/trips/{}/places", trip_id), user)
            .json(&json!({ "name": name, "visitDate": "2026-03-02", "visitTime": "10:30" }))
            .send()
            .await
            .unwrap()
    }

    fn client_config(&self, user: &str) -> ClientConfig {
        let mut config = ClientConfig::new(self.base_url.clone(), user);
        config.api_key = self.psk.clone();
        config.initial_backoff = Duration::from_millis(50);
        config
    }
}

/// A sync client as one user's process would hold it.
struct TestClient {
    api: Arc<ApiClient>,
    manager: SubscriptionManager,
}

impl TestClient {
    fn new(fixture: &TestFixture, user: &str) -> Self {
        let config = fixture.client_config(user);
        TestClient {
            api: Arc::new(ApiClient::new(&config)),
            manager: SubscriptionManager::new(SyncContext::from_config(&config)),
        }
    }

    fn collection<T: crate::sync::Resource>(&self) -> SyncedCollection<T> {
        SyncedCollection::new(self.api.clone(), Arc::new(ProjectionStore::new()))
    }
}

/// TCP relay in front of the server whose live connections can be cut,
/// standing in for a dropped network link.
struct Relay {
    base_url: String,
    links: Arc<std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    accept: tokio::task::JoinHandle<()>,
}

impl Relay {
    async fn new(fixture: &TestFixture) -> Self {
        let upstream = fixture.base_url.trim_start_matches("http://").to_string();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind relay");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let links = Arc::new(std::sync::Mutex::new(Vec::new()));

        let tracked = links.clone();
        let accept = tokio::spawn(async move {
            while let Ok((mut inbound, _)) = listener.accept().await {
                let upstream = upstream.clone();
                let link = tokio::spawn(async move {
                    if let Ok(mut outbound) = tokio::net::TcpStream::connect(upstream).await {
                        let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                    }
                });
                tracked.lock().unwrap().push(link);
            }
        });

        Relay {
            base_url,
            links,
            accept,
        }
    }

    /// Drop every connection currently relayed; new ones are still accepted.
    fn sever(&self) {
        for link in self.links.lock().unwrap().drain(..) {
            link.abort();
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.accept.abort();
        self.sever();
    }
}

/// Poll `check` until it holds or a few seconds pass.
async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = Client::new()
        .get(fixture.url("/api/trips"))
        .header("x-user-id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/trips"))
        .header("x-user-id", "alice")
        .header("Authorization", format!("Bearer {}", PSK))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_missing_user_id() {
    let fixture = TestFixture::new().await;

    let resp = fixture.client.get(fixture.url("/api/trips")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_no_psk_mode() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = Client::new()
        .get(fixture.url("/api/trips"))
        .header("x-user-id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_trip_crud_and_revision() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .request(Method::GET, "/api/trips", "alice")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let initial_revision = body["revisionId"].as_i64().unwrap();

    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap();
    assert_eq!(trip["ownerId"], "alice");
    assert_eq!(trip["startDate"], "2026-03-01");

    let resp = fixture
        .request(Method::PUT, &format!("/api/trips/{}", trip_id), "alice")
        .json(&json!({ "name": "Paris & Lyon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Paris & Lyon");
    assert_eq!(body["data"]["startDate"], "2026-03-01");
    assert_eq!(body["revisionId"].as_i64().unwrap(), initial_revision + 2);

    let alice = TestClient::new(&fixture, "alice");
    let revision = alice.api.revision().await.unwrap();
    assert_eq!(revision.revision_id, initial_revision + 2);

    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}", trip_id), "alice")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Paris & Lyon");

    let resp = fixture
        .request(Method::DELETE, &format!("/api/trips/{}", trip_id), "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}", trip_id), "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_trip_date_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .request(Method::POST, "/api/trips", "alice")
        .json(&json!({ "name": "Backwards", "startDate": "2026-03-05", "endDate": "2026-03-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_access_rules() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap();

    // Strangers cannot even see the trip
    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}", trip_id), "mallory")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let resp = fixture.create_place("mallory", trip_id, "Louvre").await;
    assert_eq!(resp.status(), 404);

    fixture.share("alice", trip_id, "victor", "viewer").await;
    fixture.share("alice", trip_id, "erin", "editor").await;

    // Viewers read but cannot edit
    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}/places", trip_id), "victor")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = fixture.create_place("victor", trip_id, "Louvre").await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Editors edit content but not the trip itself
    let resp = fixture.create_place("erin", trip_id, "Louvre").await;
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .request(Method::DELETE, &format!("/api/trips/{}", trip_id), "erin")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Only the owner manages shares
    let resp = fixture
        .request(Method::POST, &format!("/api/trips/{}/shares", trip_id), "erin")
        .json(&json!({ "userId": "frank" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Shared trips show up in the collaborator's list
    let resp = fixture
        .request(Method::GET, "/api/trips", "victor")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_share_validation() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap();

    let resp = fixture
        .request(Method::POST, &format!("/api/trips/{}/shares", trip_id), "alice")
        .json(&json!({ "userId": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let share = fixture.share("alice", trip_id, "bob", "editor").await;
    assert_eq!(share["role"], "editor");

    let resp = fixture
        .request(Method::POST, &format!("/api/trips/{}/shares", trip_id), "alice")
        .json(&json!({ "userId": "bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_place_and_accommodation_lifecycle() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap();

    let resp = fixture.create_place("alice", trip_id, "Louvre").await;
    let place: Value = resp.json::<Value>().await.unwrap()["data"].clone();
    let place_id = place["id"].as_str().unwrap();
    assert_eq!(place["tripId"], trip_id);
    assert_eq!(place["visitTime"], "10:30");

    let resp = fixture
        .request(Method::PUT, &format!("/api/trips/{}/places/{}", trip_id, place_id), "alice")
        .json(&json!({ "notes": "Book tickets" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["notes"], "Book tickets");
    assert_eq!(body["data"]["name"], "Louvre");

    let resp = fixture
        .request(Method::POST, &format!("/api/trips/{}/accommodations", trip_id), "alice")
        .json(&json!({ "name": "Hotel", "checkIn": "2026-03-04", "checkOut": "2026-03-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .request(Method::POST, &format!("/api/trips/{}/accommodations", trip_id), "alice")
        .json(&json!({ "name": "Hotel", "checkIn": "2026-03-01", "checkOut": "2026-03-04" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .request(Method::POST, &format!("/api/places/{}/files", place_id), "alice")
        .json(&json!({ "fileName": "ticket.pdf", "url": "https://files.example/ticket.pdf" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let file: Value = resp.json::<Value>().await.unwrap()["data"].clone();
    assert_eq!(file["placeId"], place_id);
    assert_eq!(file["tripId"], trip_id);
    assert_eq!(file["uploadedBy"], "alice");

    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}/snapshot", trip_id), "alice")
        .send()
        .await
        .unwrap();
    let snapshot: Value = resp.json::<Value>().await.unwrap()["data"].clone();
    assert_eq!(snapshot["trip"]["id"], trip_id);
    assert_eq!(snapshot["places"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["accommodations"].as_array().unwrap().len(), 1);

    // Deleting the place cascades to its files
    let resp = fixture
        .request(Method::DELETE, &format!("/api/trips/{}/places/{}", trip_id, place_id), "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .request(Method::GET, &format!("/api/places/{}/files", place_id), "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Deleting the trip cascades to everything else
    fixture
        .request(Method::DELETE, &format!("/api/trips/{}", trip_id), "alice")
        .send()
        .await
        .unwrap();
    let resp = fixture
        .request(Method::GET, &format!("/api/trips/{}/accommodations", trip_id), "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_ws_rejects_bad_token_and_early_subscribe() {
    let fixture = TestFixture::new().await;
    let ws_url = fixture.client_config("alice").ws_url();

    let (mut ws, _) = connect_async(ws_url.as_str()).await.unwrap();

    ws.send(Message::Text(
        json!({ "op": "subscribe", "channel": "trips" }).to_string().into(),
    ))
    .await
    .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["op"], "error");
    assert_eq!(frame["code"], "UNAUTHORIZED");

    ws.send(Message::Text(
        json!({ "op": "auth", "token": "wrong", "userId": "alice" }).to_string().into(),
    ))
    .await
    .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["op"], "error");

    ws.send(Message::Text(
        json!({ "op": "auth", "token": PSK, "userId": "alice" }).to_string().into(),
    ))
    .await
    .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame, json!({ "op": "authenticated", "userId": "alice" }));

    ws.send(Message::Text(
        json!({ "op": "subscribe", "channel": "places:nope" }).to_string().into(),
    ))
    .await
    .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["op"], "error");
    assert_eq!(frame["code"], "FORBIDDEN");

    ws.send(Message::Text(
        json!({ "op": "subscribe", "channel": "trips" }).to_string().into(),
    ))
    .await
    .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame, json!({ "op": "subscribed", "channel": "trips" }));
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no frame within timeout")
        .expect("stream ended")
        .expect("websocket error");
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {:?}", other),
    }
}

#[tokio::test]
async fn test_collaborator_edits_reach_subscribed_view() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();
    fixture.share("alice", &trip_id, "bob", "editor").await;

    let alice = TestClient::new(&fixture, "alice");
    let places = alice.collection::<Place>();
    let stays = alice.collection::<Accommodation>();

    let mut view = alice.manager.mount();
    view.watch(places.store().clone(), vec![trip_id.clone()]);
    view.watch(stays.store().clone(), vec![trip_id.clone()]);
    places.load(&trip_id, view.liveness()).await.unwrap();
    stays.load(&trip_id, view.liveness()).await.unwrap();
    view.ready().await;

    let connection = alice.manager.context().connection();
    eventually("places channel joined", || {
        connection.joined_channels().contains(&format!("places:{}", trip_id))
            && connection.joined_channels().contains(&format!("accommodations:{}", trip_id))
    })
    .await;

    // Bob edits through the API; Alice's projection follows.
    let resp = fixture.create_place("bob", &trip_id, "Louvre").await;
    let place_id = resp.json::<Value>().await.unwrap()["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    eventually("place created", || places.store().len(&trip_id) == 1).await;

    fixture
        .request(Method::PUT, &format!("/api/trips/{}/places/{}", trip_id, place_id), "bob")
        .json(&json!({ "name": "Musee du Louvre" }))
        .send()
        .await
        .unwrap();
    eventually("place renamed", || {
        places
            .store()
            .get(&trip_id, &place_id)
            .is_some_and(|p| p.name == "Musee du Louvre")
    })
    .await;

    fixture
        .request(Method::DELETE, &format!("/api/trips/{}/places/{}", trip_id, place_id), "bob")
        .send()
        .await
        .unwrap();
    eventually("place deleted", || places.store().len(&trip_id) == 0).await;

    // Alice's own optimistic update converges with the echo.
    let bob = TestClient::new(&fixture, "bob");
    let bob_stays = bob.collection::<Accommodation>();
    bob_stays.load(&trip_id, &crate::sync::Liveness::new()).await.unwrap();
    let stay = bob_stays
        .create(
            &trip_id,
            serde_json::from_value(json!({
                "name": "Hotel", "checkIn": "2026-03-01", "checkOut": "2026-03-04"
            }))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bob_stays.store().len(&trip_id), 1);
    eventually("stay created", || stays.store().len(&trip_id) == 1).await;

    let updated = stays
        .update(
            &trip_id,
            &stay.id,
            UpdateAccommodationRequest {
                notes: Some("Late check-in".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Late check-in"));
    assert_eq!(stays.store().len(&trip_id), 1);
    assert_eq!(
        stays.store().get(&trip_id, &stay.id).unwrap().notes.as_deref(),
        Some("Late check-in")
    );
}

#[tokio::test]
async fn test_optimistic_create_with_echo_yields_one_entity() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let alice = TestClient::new(&fixture, "alice");
    let places = alice.collection::<Place>();
    let mut view = alice.manager.mount();
    view.watch(places.store().clone(), vec![trip_id.clone()]);
    places.load(&trip_id, view.liveness()).await.unwrap();
    view.ready().await;

    let connection = alice.manager.context().connection();
    eventually("places channel joined", || {
        connection.joined_channels().contains(&format!("places:{}", trip_id))
    })
    .await;

    let draft = CreatePlaceRequest {
        name: "Louvre".into(),
        ..Default::default()
    };
    let created = places.create(&trip_id, draft).await.unwrap();
    assert!(!created.id.starts_with(crate::sync::TEMP_ID_PREFIX));

    // Whether the echo lands before or after the response, one entity remains.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let items = places.store().items(&trip_id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, created.id);

    // A failed create rolls back its optimistic entry.
    let invalid = CreatePlaceRequest {
        name: "   ".into(),
        ..Default::default()
    };
    let err = places.create(&trip_id, invalid).await.unwrap_err();
    assert_eq!(err.code(), Some("VALIDATION_ERROR"));
    assert_eq!(places.store().len(&trip_id), 1);
}

#[tokio::test]
async fn test_trip_list_audience() {
    let fixture = TestFixture::new().await;

    let alice = TestClient::new(&fixture, "alice");
    let carol = TestClient::new(&fixture, "carol");
    let alice_trips = alice.collection::<Trip>();
    let carol_trips = carol.collection::<Trip>();

    let mut alice_view = alice.manager.mount();
    alice_view.watch(alice_trips.store().clone(), vec![UNSCOPED.to_string()]);
    alice_trips.load(UNSCOPED, alice_view.liveness()).await.unwrap();
    let mut carol_view = carol.manager.mount();
    carol_view.watch(carol_trips.store().clone(), vec![UNSCOPED.to_string()]);
    carol_trips.load(UNSCOPED, carol_view.liveness()).await.unwrap();
    alice_view.ready().await;
    carol_view.ready().await;

    let alice_conn = alice.manager.context().connection();
    let carol_conn = carol.manager.context().connection();
    eventually("trips joined", || {
        alice_conn.joined_channels() == vec!["trips"] && carol_conn.joined_channels() == vec!["trips"]
    })
    .await;

    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();
    eventually("alice sees her trip", || alice_trips.store().len(UNSCOPED) == 1).await;

    // Carol shares the channel name but is not a member.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(carol_trips.store().len(UNSCOPED), 0);

    // Sharing announces the trip to Carol; revoking takes it away again.
    let share = fixture.share("alice", &trip_id, "carol", "viewer").await;
    eventually("carol sees the shared trip", || carol_trips.store().len(UNSCOPED) == 1).await;

    fixture
        .request(
            Method::DELETE,
            &format!("/api/trips/{}/shares/{}", trip_id, share["id"].as_str().unwrap()),
            "alice",
        )
        .send()
        .await
        .unwrap();
    eventually("carol loses the trip", || carol_trips.store().len(UNSCOPED) == 0).await;
    assert_eq!(alice_trips.store().len(UNSCOPED), 1);
}

#[tokio::test]
async fn test_unauthorized_channel_is_not_joined() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let mallory = TestClient::new(&fixture, "mallory");
    let places = mallory.collection::<Place>();
    let mut view = mallory.manager.mount();
    view.watch(places.store().clone(), vec![trip_id.clone()]);
    view.ready().await;

    fixture.create_place("alice", &trip_id, "Louvre").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let connection = mallory.manager.context().connection();
    assert!(connection.joined_channels().is_empty());
    assert_eq!(places.store().len(&trip_id), 0);
}

#[tokio::test]
async fn test_unmounted_view_stops_receiving() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let alice = TestClient::new(&fixture, "alice");
    let list_places = alice.collection::<Place>();
    let map_places = alice.collection::<Place>();

    let mut list_view = alice.manager.mount();
    list_view.watch(list_places.store().clone(), vec![trip_id.clone()]);
    let mut map_view = alice.manager.mount();
    map_view.watch(map_places.store().clone(), vec![trip_id.clone()]);
    list_places.load(&trip_id, list_view.liveness()).await.unwrap();
    map_places.load(&trip_id, map_view.liveness()).await.unwrap();
    list_view.ready().await;

    let connection = alice.manager.context().connection();
    eventually("places channel joined", || !connection.joined_channels().is_empty()).await;

    drop(list_view);
    assert_eq!(connection.active_channels(), vec![format!("places:{}", trip_id)]);

    fixture.create_place("alice", &trip_id, "Louvre").await;
    eventually("map view still updated", || map_places.store().len(&trip_id) == 1).await;
    assert_eq!(list_places.store().len(&trip_id), 0);
}

#[tokio::test]
async fn test_revoked_collaborator_stops_receiving_trip_events() {
    let fixture = TestFixture::new().await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();
    let share = fixture.share("alice", &trip_id, "bob", "viewer").await;
    let share_id = share["id"].as_str().unwrap().to_string();

    // Bob only has the trip detail open; he never joins `trips`.
    let bob = TestClient::new(&fixture, "bob");
    let bob_places = bob.collection::<Place>();
    let mut bob_view = bob.manager.mount();
    bob_view.watch(bob_places.store().clone(), vec![trip_id.clone()]);
    bob_places.load(&trip_id, bob_view.liveness()).await.unwrap();
    bob_view.ready().await;

    let alice = TestClient::new(&fixture, "alice");
    let alice_places = alice.collection::<Place>();
    let mut alice_view = alice.manager.mount();
    alice_view.watch(alice_places.store().clone(), vec![trip_id.clone()]);
    alice_places.load(&trip_id, alice_view.liveness()).await.unwrap();
    alice_view.ready().await;

    let channel = format!("places:{}", trip_id);
    let bob_connection = bob.manager.context().connection();
    let alice_connection = alice.manager.context().connection();
    eventually("both sessions joined", || {
        bob_connection.joined_channels().contains(&channel)
            && alice_connection.joined_channels().contains(&channel)
    })
    .await;

    fixture.create_place("alice", &trip_id, "Louvre").await;
    eventually("bob sees the shared place", || bob_places.store().len(&trip_id) == 1).await;

    let resp = fixture
        .request(
            Method::DELETE,
            &format!("/api/trips/{}/shares/{}", trip_id, share_id),
            "alice",
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    tokio::time::sleep(Duration::from_millis(200)).await;

    fixture.create_place("alice", &trip_id, "Secret spot").await;
    eventually("alice sees her new place", || alice_places.store().len(&trip_id) == 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let names: Vec<_> = bob_places
        .store()
        .items(&trip_id)
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Louvre".to_string()]);
}

#[tokio::test]
async fn test_dropped_session_rejoins_active_channels() {
    let fixture = TestFixture::new().await;
    let relay = Relay::new(&fixture).await;
    let trip = fixture.create_trip("alice", "Paris").await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    // REST goes straight to the server; the realtime link runs through the relay.
    let api = Arc::new(ApiClient::new(&fixture.client_config("alice")));
    let mut ws_config = fixture.client_config("alice");
    ws_config.server_url = relay.base_url.clone();
    let manager = SubscriptionManager::new(SyncContext::from_config(&ws_config));

    let places = SyncedCollection::<Place>::new(api, Arc::new(ProjectionStore::new()));
    let mut view = manager.mount();
    view.watch(places.store().clone(), vec![trip_id.clone()]);
    places.load(&trip_id, view.liveness()).await.unwrap();
    view.ready().await;

    let channel = format!("places:{}", trip_id);
    let connection = manager.context().connection();
    eventually("places channel joined", || connection.joined_channels() == vec![channel.clone()])
        .await;
    assert!(!view.is_stale());

    relay.sever();
    eventually("disconnect noticed", || connection.is_stale()).await;

    // Nothing re-subscribes by hand: the transport reconnects, re-authenticates
    // and the connection re-joins what is still registered.
    eventually("channel re-joined", || {
        connection.state() == ConnectionState::Connected
            && connection.joined_channels() == vec![channel.clone()]
    })
    .await;

    places.load(&trip_id, view.liveness()).await.unwrap();
    view.mark_fresh();
    assert!(!view.is_stale());

    fixture.create_place("alice", &trip_id, "Louvre").await;
    eventually("event after reconnect delivered", || places.store().len(&trip_id) == 1).await;
}
