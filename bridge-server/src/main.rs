//! # Jupyter-Bridge Server
//!
//! A rendezvous relay between a remote notebook kernel and a browser-local
//! application the kernel cannot reach directly. The kernel parks a request
//! on a channel; the browser long-polls it, executes it against the local
//! application, and posts back the raw reply, which the kernel long-polls in
//! turn. Long-poll (not WebSockets) so the service traverses the hostile
//! corporate proxies common around research-lab notebooks.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - Redis (or an in-memory map) for the per-channel slot store
//! - `bridge-core` for the rendezvous engine and its timing contract
//! - `tracing` with a rolling file appender for the detail log

/// Server config
mod config;

/// Error types and handling
mod errors;

/// Mailbox and liveness handlers
mod handlers;

/// Subscriber setup
mod logging;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use bridge_core::{MemorySlotStore, RedisSlotStore, RendezvousEngine, SlotStore};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Config;
use crate::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.log_dir);

    info!("Jupyter-Bridge configuration loaded");
    info!(
        "Long-poll deadline: {}s, polling cadence: {}s/{}s, fast-poll allowance: {}",
        config.dequeue_timeout_secs,
        config.fast_poll_secs,
        config.slow_poll_secs,
        config.allowed_fast_polls
    );
    info!("Cross-slot handoff policy: {:?}", config.handoff_policy());

    let store: Arc<dyn SlotStore> = if config.memory_store {
        info!("Using in-memory slot store");
        Arc::new(MemorySlotStore::new())
    } else {
        Arc::new(RedisSlotStore::connect(&config.redis_url).await?)
    };

    let engine = Arc::new(RendezvousEngine::new(
        store,
        config.poll_timings(),
        config.handoff_policy(),
    ));
    let state = AppState {
        engine,
        pad_responses: config.pad_responses,
    };
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Starting Jupyter-Bridge relay on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    // The browser must be able to inspect every status, so the CORS header
    // is stamped on all responses, errors included.
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/queue_request", post(handlers::queue_request))
        .route("/queue_reply", post(handlers::queue_reply))
        .route("/dequeue_request", get(handlers::dequeue_request))
        .route("/dequeue_reply", get(handlers::dequeue_reply))
        .route("/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}
