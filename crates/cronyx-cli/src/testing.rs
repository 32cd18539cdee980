//! In-process lock server for subcommand tests.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Clone)]
pub(crate) struct LockServer {
    acquire_body: Arc<Value>,
    release_status: StatusCode,
    requests: Arc<Mutex<Vec<(Method, String)>>>,
}

impl LockServer {
    /// Grants every acquire with `body`; `Value::Null` declines.
    pub(crate) fn new(body: Value) -> Self {
        LockServer {
            acquire_body: Arc::new(body),
            release_status: StatusCode::OK,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing_releases(mut self) -> Self {
        self.release_status = StatusCode::INTERNAL_SERVER_ERROR;
        self
    }

    pub(crate) fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Binds to an ephemeral port and returns the base URL.
    pub(crate) async fn start(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn handle(State(server): State<LockServer>, method: Method, uri: Uri) -> Response {
    server
        .requests
        .lock()
        .unwrap()
        .push((method.clone(), uri.path().to_string()));

    if method == Method::POST {
        Json(server.acquire_body.as_ref().clone()).into_response()
    } else {
        server.release_status.into_response()
    }
}

/// A one-day grant for `nightly`; `id: None` makes it advisory.
pub(crate) fn grant_json(id: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": "nightly",
        "interval": 86_400_000u64,
        "intervalStartedAt": "2023-02-02T15:00:00.000Z",
        "intervalEndedAt": "2023-02-03T15:00:00.000Z",
        "isActive": true,
        "createdAt": "2023-02-03T15:00:00.000Z",
        "updatedAt": "2023-02-03T15:00:00.000Z",
    })
}
