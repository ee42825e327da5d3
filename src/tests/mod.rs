//! Unit and integration tests for the MediaSync client.
//!
//! ## Test Modules
//!
//! - **store_tests**: Session history persistence
//! - **session_tests**: Session context lifecycle and two-phase updates
//! - **request_tests**: Authenticated request layer against a mock host
//! - **catalog_tests**: File listing, file fetch and settings
//! - **transfer_tests**: Cancellable downloads through the coordinator
//! - **pairing_tests**: Scan/manual pairing state machine
//! - **types_tests**: Wire formats and presentation helpers
//! - **config_tests**: Configuration defaults and validation
//! - **error_tests**: Error classification
//!
//! The mock host below is a small axum app bound to an ephemeral port.

pub mod transfer_tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::NamedTempFile;

use crate::config::HttpConfig;
use crate::db;
use crate::request::HostClient;
use crate::types::Credential;

pub const TOKEN: &str = "secret";

#[derive(Default)]
pub struct MockState {
    pub hits: AtomicUsize,
    pub last_auth: Mutex<Option<String>>,
    pub last_query: Mutex<HashMap<String, String>>,
    pub last_body: Mutex<Option<Value>>,
    pub file_delay_ms: AtomicU64,
}

impl MockState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
        let expected = format!("Bearer {}", TOKEN);
        let ok = auth.as_deref() == Some(expected.as_str());
        *self.last_auth.lock().unwrap() = auth;
        if ok {
            Ok(())
        } else {
            Err(StatusCode::UNAUTHORIZED.into_response())
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub struct MockHost {
    pub base: String,
    pub state: Arc<MockState>,
}

impl MockHost {
    pub fn credential(&self) -> Credential {
        Credential::new(&self.base, TOKEN)
    }
}

pub fn audio_entry() -> Value {
    json!({
        "name": "song",
        "path": "/music/rock/song.mp3",
        "extension": ".mp3",
        "type": "audio",
        "metadata": {
            "size": 5242880,
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-02T00:00:00Z",
            "type": "audio/mpeg",
            "audioMetaData": { "duration": 185.4, "sampleRate": 44100 }
        }
    })
}

async fn list_audio(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    Json(json!({
        "data": [
            { "key": "/music/rock", "/music/rock": [audio_entry()] },
            { "key": "C:\\music\\jazz", "C:\\music\\jazz": [] }
        ],
        "message": "ok"
    }))
    .into_response()
}

async fn list_video(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn audio_file(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    *s.last_query.lock().unwrap() = q;
    let delay = s.file_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let mut file = audio_entry();
    file["data"] = json!({ "type": "Buffer", "data": [1, 2, 3, 4] });
    Json(json!({ "data": file, "message": "ok" })).into_response()
}

async fn image_file(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    Json(json!({ "data": null, "message": "not found" })).into_response()
}

async fn get_settings(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    Json(json!({
        "data": { "settings": {
            "allowList": ["192.168.1.20"],
            "imagePaths": ["/srv/pictures"],
            "audioPaths": ["/srv/music"],
            "videoPaths": [],
            "imageExt": [".png", ".jpg"],
            "audioExt": [".mp3"],
            "videoExt": [".mp4"],
            "server": { "host": "0.0.0.0", "port": 3000 }
        }},
        "message": "ok"
    }))
    .into_response()
}

async fn post_settings(State(s): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = s.authorize(&headers) {
        return r;
    }
    *s.last_body.lock().unwrap() = Some(body.clone());
    Json(json!({ "data": body, "message": "updated" })).into_response()
}

/// Starts the mock host on 127.0.0.1 with an ephemeral port.
pub async fn spawn_host() -> MockHost {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/audio", get(list_audio))
        .route("/api/video", get(list_video))
        .route("/api/audio/file", get(audio_file))
        .route("/api/image/file", get(image_file))
        .route("/api/settings", get(get_settings).post(post_settings))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockHost { base: format!("http://{}", addr), state }
}

pub fn host_client() -> HostClient {
    HostClient::new(&HttpConfig::default()).unwrap()
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    db::init_db(&pool).await.unwrap();
    pool
}

/// File-backed database; keep the returned file alive for the test.
pub async fn file_pool() -> (sqlx::SqlitePool, NamedTempFile) {
    let temp_db = NamedTempFile::new().unwrap();
    let db_url = format!("sqlite:{}", temp_db.path().display());
    let pool = db::connect(&db_url).await.unwrap();
    (pool, temp_db)
}

pub async fn reopen(file: &NamedTempFile) -> sqlx::SqlitePool {
    db::connect(&format!("sqlite:{}", file.path().display())).await.unwrap()
}

/// Polls `cond` until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
