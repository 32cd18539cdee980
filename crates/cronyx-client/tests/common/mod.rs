//! In-process lock server for integration tests.
//!
//! Records every request it receives and answers with canned responses.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
struct ServerState {
    requests: Vec<RecordedRequest>,
    acquire_status: StatusCode,
    acquire_body: String,
    release_status: StatusCode,
}

#[derive(Clone)]
pub struct MockLockServer {
    state: Arc<Mutex<ServerState>>,
}

#[allow(dead_code)]
impl MockLockServer {
    pub fn new() -> Self {
        MockLockServer {
            state: Arc::new(Mutex::new(ServerState {
                requests: Vec::new(),
                acquire_status: StatusCode::OK,
                acquire_body: grant_json("abc", "nightly").to_string(),
                release_status: StatusCode::OK,
            })),
        }
    }

    pub fn respond_to_acquire(&self, status: StatusCode, body: Value) {
        self.respond_to_acquire_raw(status, body.to_string());
    }

    pub fn respond_to_acquire_raw(&self, status: StatusCode, body: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.acquire_status = status;
        state.acquire_body = body.into();
    }

    pub fn respond_to_release(&self, status: StatusCode) {
        self.state.lock().unwrap().release_status = status;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Binds to an ephemeral port and returns the base URL.
    pub async fn start(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(record).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn record(
    State(server): State<MockLockServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut state = server.state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        content_type: header("content-type"),
        authorization: header("authorization"),
        body: serde_json::from_slice(&body).ok(),
    });

    if method == Method::POST {
        (
            state.acquire_status,
            [("content-type", "application/json")],
            state.acquire_body.clone(),
        )
            .into_response()
    } else {
        state.release_status.into_response()
    }
}

pub fn grant_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "interval": 86_400_000u64,
        "intervalStartedAt": "2023-02-02T15:00:00.000Z",
        "intervalEndedAt": "2023-02-03T15:00:00.000Z",
        "isActive": true,
        "createdAt": "2023-02-03T15:00:00.000Z",
        "updatedAt": "2023-02-03T15:00:00.000Z",
    })
}
