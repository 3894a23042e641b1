//! Shared fixtures: in-memory SQLite store and a fake Cloud API.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::task::JoinHandle;

use ticketline::dispatch::Dispatcher;
use ticketline::notify::{Notifier, NotifyError};
use ticketline::store::sqlite::{apply_schema, SqliteStore};
use ticketline::whatsapp::client::CloudApiClient;

/// Business number used by every fixture.
pub const BUSINESS_NUMBER: &str = "15550000000";

/// Phone number id used in fake API paths.
pub const PHONE_NUMBER_ID: &str = "1098765";

/// Fresh in-memory store with the schema applied.
pub async fn memory_store() -> Arc<SqliteStore> {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true)
        .foreign_keys(true);
    // In-memory databases are per-connection, so limit to 1 connection.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("in-memory pool should connect");
    apply_schema(&pool).await.expect("schema should apply");
    Arc::new(SqliteStore::from_pool(pool))
}

/// One request captured by the fake API.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// JSON body.
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    response: Arc<Value>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// A local stand-in for the Cloud API messages endpoint.
pub struct FakeApi {
    /// Base URL to hand to [`CloudApiClient`].
    pub base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl FakeApi {
    /// Serve `response` with `status` for every send.
    pub async fn start(status: StatusCode, response: Value) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            response: Arc::new(response),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/{phone_number_id}/messages", post(capture))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle,
        }
    }

    /// Accept every send and return a message id.
    pub async fn accepting() -> Self {
        Self::start(
            StatusCode::OK,
            json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "x", "wa_id": "x"}],
                "messages": [{"id": "wamid.OUT1"}]
            }),
        )
        .await
    }

    /// Reject every send with 400 and a Graph-style error body.
    pub async fn rejecting() -> Self {
        Self::start(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Invalid parameter", "code": 100}}),
        )
        .await
    }

    /// Client pointed at this server.
    pub fn client(&self) -> CloudApiClient {
        CloudApiClient::new(
            self.base_url.clone(),
            PHONE_NUMBER_ID.to_owned(),
            "test-token".to_owned(),
        )
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn capture(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(CapturedRequest {
            authorization,
            body,
        });
    }
    (state.status, Json((*state.response).clone()))
}

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    /// `(subject, recipient, body)` for every notification.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((subject.to_owned(), recipient.to_owned(), body.to_owned()));
        }
        Ok(())
    }
}

/// Dispatcher wired to `api` and `store`, notifying `operator` when given.
pub fn dispatcher(
    api: &FakeApi,
    store: Arc<SqliteStore>,
    notifier: Arc<dyn Notifier>,
    operator: Option<&str>,
) -> Dispatcher {
    Dispatcher::new(
        api.client(),
        store,
        notifier,
        BUSINESS_NUMBER.to_owned(),
        operator.map(str::to_owned),
    )
}

/// Count rows in `messages` with the given direction.
pub async fn count_messages(store: &SqliteStore, direction: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE direction = ?1")
        .bind(direction)
        .fetch_one(store.pool())
        .await
        .expect("count should succeed")
}
