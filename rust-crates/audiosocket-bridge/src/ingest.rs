//! HTTP ingestion endpoint for producer events.
//!
//! Endpoints:
//! - `POST` on any path (the userscript uses `/sound`): one JSON sound
//!   event, always acknowledged regardless of size or content
//! - `OPTIONS` on any path: CORS pre-flight with an empty success response

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::BridgeState;

/// Fixed acknowledgment body
pub const ACK_BODY: &str = r#"{"ok":true}"#;

/// Serve the ingestion endpoint on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<BridgeState>) -> std::io::Result<()> {
    info!("Ingestion endpoint listening on http://{}/sound", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

/// Build the axum router (separated for testing).
pub fn router(state: Arc<BridgeState>) -> Router {
    // The userscript posts from the game page's origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", post(ingest_sound))
        .route("/*path", post(ingest_sound))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}

/// Acknowledge, then normalize and broadcast.
///
/// The body is taken as raw bytes so a malformed payload is still
/// acknowledged; broadcasting only queues frames and cannot stall here.
async fn ingest_sound(State(state): State<Arc<BridgeState>>, body: Bytes) -> impl IntoResponse {
    state.ingest(&body);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        ACK_BODY,
    )
}
