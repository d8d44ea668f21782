//! ExaPrep · Exam Generator Backend
//!
//! - Axum HTTP + WebSocket API for generating practice exams from uploaded course material
//! - Gemini integration (structured JSON output) when an API key is present
//! - Bounded exam history persisted as JSON
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   GEMINI_API_KEY       : enables generation (API_KEY is accepted as a fallback)
//!   GEMINI_BASE_URL      : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL         : default "gemini-2.5-flash"
//!   GEMINI_TIMEOUT_SECS  : default 120
//!   EXAPREP_CONFIG_PATH  : path to TOML config (question bounds, history path, upload limit)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default), "compact" or "json"

mod config;
mod domain;
mod encoder;
mod error;
mod gemini;
mod generation;
mod history;
mod logic;
mod orchestrator;
mod prompt;
mod protocol;
mod routes;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

  // Shared state: orchestrator (Gemini client + history store) and config.
  let state = Arc::new(AppState::new(config));

  // HTTP router with routes, body limit, CORS and tracing layers.
  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "exaprep_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "exaprep_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "exaprep_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
