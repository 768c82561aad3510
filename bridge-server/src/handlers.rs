use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use bridge_core::{RendezvousEngine, SlotKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// Trailing whitespace appended to dequeue bodies. Compensates for a
/// proxy-layer truncation of the last segment on connection close; removing
/// it breaks deployed clients.
pub(crate) const PAD_BYTES: usize = 1500;

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<RendezvousEngine>,
    pub pad_responses: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChannelParams {
    channel: Option<String>,
    reset: Option<String>,
}

impl ChannelParams {
    fn channel(&self) -> AppResult<&str> {
        self.channel.as_deref().ok_or_else(AppError::missing_channel)
    }

    /// `reset` is a presence-only flag: `?channel=C&reset`.
    fn reset(&self) -> bool {
        self.reset.is_some()
    }
}

pub async fn ping() -> Response {
    debug!("into ping");
    plain(
        StatusCode::OK,
        format!("pong {}", env!("CARGO_PKG_VERSION")),
    )
}

pub async fn queue_request(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    debug!("into queue_request");
    let channel = params.channel()?;
    require_content_type(&headers, "application/json")?;
    state
        .engine
        .enqueue(SlotKind::Request, channel, body.to_vec())
        .await?;
    Ok(plain(StatusCode::OK, String::new()))
}

pub async fn queue_reply(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    debug!("into queue_reply");
    let channel = params.channel()?;
    require_content_type(&headers, "text/plain")?;
    state
        .engine
        .enqueue(SlotKind::Reply, channel, body.to_vec())
        .await?;
    Ok(plain(StatusCode::OK, String::new()))
}

pub async fn dequeue_request(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> AppResult<Response> {
    debug!("into dequeue_request");
    let channel = params.channel()?;
    match state
        .engine
        .dequeue(SlotKind::Request, channel, params.reset())
        .await?
    {
        Some(message) => Ok(delivery(message, state.pad_responses)),
        None => Ok(plain(StatusCode::REQUEST_TIMEOUT, String::new())),
    }
}

pub async fn dequeue_reply(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> AppResult<Response> {
    debug!("into dequeue_reply");
    let channel = params.channel()?;
    match state
        .engine
        .dequeue(SlotKind::Reply, channel, params.reset())
        .await?
    {
        Some(message) => Ok(delivery(message, state.pad_responses)),
        None => Ok(plain(StatusCode::REQUEST_TIMEOUT, String::new())),
    }
}

/// Snapshot of every known channel's slot metadata.
pub async fn status(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    debug!("into status");
    Ok(Json(state.engine.snapshot().await?))
}

fn require_content_type(headers: &HeaderMap, expected: &'static str) -> AppResult<()> {
    let actual = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if actual.starts_with(expected) {
        Ok(())
    } else {
        warn!(expected, actual, "rejecting payload with wrong content type");
        Err(AppError::bad_content_type(expected))
    }
}

/// Bodies never carry a charset parameter; downstream clients infer their own.
fn plain(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

fn delivery(mut message: Vec<u8>, pad: bool) -> Response {
    if pad {
        message.resize(message.len() + PAD_BYTES, b' ');
    }
    // Dequeue bodies are declared JSON even for raw replies (historical;
    // reply payloads are opaque bytes).
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        message,
    )
        .into_response()
}
