//! Webhook HTTP server built on axum.
//!
//! Routes:
//! - `GET /webhook`: platform verification handshake
//! - `POST /webhook`: inbound message and status deliveries
//! - `GET /health`: liveness probe

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::dispatch::DispatchError;
use crate::pipeline::{Pipeline, PipelineError};
use crate::whatsapp::webhook::{parse_webhook, WebhookParse};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The inbound message pipeline.
    pub pipeline: Arc<Pipeline>,
    /// Token the platform must echo during verification.
    pub verify_token: Arc<str>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve `router` until the process exits.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    info!(%addr, "webhook server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| anyhow::anyhow!("webhook server error: {e}"))
}

async fn health() -> &'static str {
    "ok"
}

async fn verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    match (mode, token, params.get("hub.challenge")) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == &*state.verify_token => {
            info!("webhook verified");
            (StatusCode::OK, challenge.clone()).into_response()
        }
        _ => {
            warn!(mode = ?mode, "webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn receive(State(state): State<AppState>, body: Bytes) -> Response {
    let batch = match parse_webhook(&body) {
        WebhookParse::Batch(batch) => batch,
        WebhookParse::Empty => return acknowledge("empty body"),
        WebhookParse::Invalid(reason) => {
            warn!(reason = %reason, "invalid webhook payload");
            return acknowledge("invalid payload");
        }
        WebhookParse::NoEntry => return acknowledge("no entry"),
        WebhookParse::NoChanges => return acknowledge("no changes"),
    };

    for status in batch.statuses.iter().flatten() {
        info!(message_id = %status.message_id, status = %status.status, "delivery status");
    }

    let report = state.pipeline.process_batch(&batch).await;
    debug!(
        replied = report.replied,
        duplicates = report.duplicates,
        skipped = report.skipped,
        failed = report.failures.len(),
        "webhook batch processed"
    );

    match report.failures.into_iter().next() {
        Some(failure) => (StatusCode::BAD_GATEWAY, failure_body(failure)).into_response(),
        None => acknowledge("ok"),
    }
}

fn acknowledge(message: &'static str) -> Response {
    (StatusCode::OK, message).into_response()
}

/// Response body for a failed reply: the upstream body when the API answered.
fn failure_body(failure: PipelineError) -> String {
    match failure {
        PipelineError::Dispatch {
            source: DispatchError::Rejected { body, .. },
            ..
        } => body,
        PipelineError::Dispatch { source, .. } => source.to_string(),
    }
}
