//! Local stand-ins for the Spotify identity and catalog services.

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tunescout_core::{CredentialStore, ManualClock, MemoryStore, Navigator};

use crate::config::SpotifyProviderConfig;
use crate::credentials::CredentialManager;

pub const STUB_CLIENT_ID: &str = "stub-client";
pub const STUB_CLIENT_SECRET: &str = "stub-secret";
pub const TOKEN_TTL_SECS: u64 = 3600;

#[derive(Default)]
pub struct StubState {
    pub token_requests: AtomicUsize,
    pub catalog_requests: AtomicUsize,
    pub reject_tokens: AtomicBool,
    /// Answer 200 with an empty `access_token`
    pub empty_tokens: AtomicBool,
    pub catalog_unauthorized: AtomicBool,
    pub last_grant: Mutex<HashMap<String, String>>,
    pub last_query: Mutex<HashMap<String, String>>,
    pub last_authorization: Mutex<Option<String>>,
}

impl StubState {
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn catalog_requests(&self) -> usize {
        self.catalog_requests.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().unwrap().clone()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }
}

pub struct StubServer {
    pub base_url: String,
    pub state: Arc<StubState>,
}

pub async fn spawn_stub() -> StubServer {
    let state = Arc::new(StubState::default());

    let app = Router::new()
        .route("/api/token", post(token))
        .route("/v1/browse/new-releases", get(new_releases))
        .route("/v1/albums/{id}/tracks", get(album_tracks))
        .route("/v1/me/albums", get(user_albums))
        .route("/v1/search", get(search))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

pub struct Harness {
    pub stub: StubServer,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
    pub credentials: Arc<CredentialManager>,
}

pub const START_MS: u64 = 1_700_000_000_000;

pub async fn harness() -> Harness {
    let stub = spawn_stub().await;
    let config = SpotifyProviderConfig {
        client_id: STUB_CLIENT_ID.into(),
        client_secret: STUB_CLIENT_SECRET.into(),
        accounts_url: stub.base_url.clone(),
        api_base_url: stub.base_url.clone(),
        ..SpotifyProviderConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START_MS));
    let navigator = Arc::new(RecordingNavigator::default());
    let credentials = Arc::new(CredentialManager::new(
        config,
        store.clone() as Arc<dyn CredentialStore>,
        reqwest::Client::new(),
        clock.clone(),
        navigator.clone(),
    ));

    Harness {
        stub,
        store,
        clock,
        navigator,
        credentials,
    }
}

fn record_request(state: &StubState, headers: &HeaderMap, query: HashMap<String, String>) {
    state.catalog_requests.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = query;
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
    )
        .into_response()
}

async fn token(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    *state.last_grant.lock().unwrap() = form.clone();

    let has_basic_auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !has_basic_auth || state.reject_tokens.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }

    if state.empty_tokens.load(Ordering::SeqCst) {
        return Json(json!({
            "access_token": "",
            "token_type": "Bearer",
            "expires_in": TOKEN_TTL_SECS,
        }))
        .into_response();
    }

    let body = match form.get("grant_type").map(String::as_str) {
        Some("client_credentials") => json!({
            "access_token": format!("app-token-{n}"),
            "token_type": "Bearer",
            "expires_in": TOKEN_TTL_SECS,
        }),
        Some("authorization_code") => json!({
            "access_token": "user-token",
            "token_type": "Bearer",
            "scope": "user-library-read user-read-private user-read-email",
            "expires_in": TOKEN_TTL_SECS,
            "refresh_token": "refresh-token",
        }),
        Some("refresh_token") => json!({
            "access_token": "user-token-refreshed",
            "token_type": "Bearer",
            "expires_in": TOKEN_TTL_SECS,
        }),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "unsupported_grant_type"})),
            )
                .into_response()
        }
    };
    Json(body).into_response()
}

pub fn album_json(id: &str, name: &str) -> Value {
    json!({
        "album_type": "album",
        "id": id,
        "name": name,
        "release_date": "2024-05-17",
        "total_tracks": 2,
        "images": [
            {"url": format!("https://i.scdn.co/image/{id}-300"), "height": 300, "width": 300},
            {"url": format!("https://i.scdn.co/image/{id}-640"), "height": 640, "width": 640}
        ],
        "artists": [{"id": "artist-1", "name": "Rosalía", "type": "artist"}]
    })
}

pub fn track_json(id: &str, name: &str, number: u32, preview_url: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "duration_ms": 180_000,
        "preview_url": preview_url,
        "disc_number": 1,
        "track_number": number,
        "artists": [{"id": "artist-1", "name": "Rosalía"}]
    })
}

async fn new_releases(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record_request(&state, &headers, query);
    if state.catalog_unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }
    Json(json!({
        "albums": {
            "href": "https://api.spotify.com/v1/browse/new-releases",
            "items": [album_json("album-1", "Motomami"), album_json("album-2", "El Mal Querer")],
            "total": 2
        }
    }))
    .into_response()
}

async fn album_tracks(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record_request(&state, &headers, query);
    if state.catalog_unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Non existing id"}})),
        )
            .into_response();
    }
    Json(json!({
        "items": [
            track_json("track-1", "Saoko", 1, Some("https://p.scdn.co/mp3-preview/1")),
            track_json("track-2", "Candy", 2, None)
        ],
        "total": 2
    }))
    .into_response()
}

async fn user_albums(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record_request(&state, &headers, query);
    if state.catalog_unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }
    Json(json!({
        "items": [
            {"added_at": "2024-06-01T10:00:00Z", "album": album_json("album-3", "Los Ángeles")}
        ],
        "total": 1
    }))
    .into_response()
}

async fn search(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    record_request(&state, &headers, query);
    if state.catalog_unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }
    // No "artists" bucket on purpose
    Json(json!({
        "albums": {"items": [album_json("album-1", "Motomami")], "total": 1},
        "tracks": {"items": [track_json("track-1", "Saoko", 1, None)], "total": 1}
    }))
    .into_response()
}
