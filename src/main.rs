//! Math Navigator · Adaptive practice backend
//!
//! - Curriculum graph of middle-school math standards with prerequisite edges
//! - Remediation routing: wrong answer -> diagnosed error category -> prerequisite
//! - Axum HTTP + WebSocket API around a per-learner session state machine
//! - OpenAI-compatible content provider (questions, diagnoses, hints)
//! - Static presentation layer fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   OPENAI_API_KEY       : REQUIRED; the server refuses to start without it
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL    : default "gpt-4o-mini" (hints)
//!   OPENAI_STRONG_MODEL  : default "gpt-4o" (questions, diagnoses)
//!   OPENAI_TIMEOUT_SECS  : default 20
//!   CURRICULUM_PATH      : curriculum JSON; built-in grade 6-8 curriculum if unset
//!   DEFAULT_STANDARD     : overrides [tutor].default_standard
//!   AGENT_CONFIG_PATH    : path to TOML config ([prompts] + [tutor])
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod curriculum;
mod diagnosis;
mod session;
mod provider;
mod openai;
mod logic;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Curriculum, provider and settings; any failure here is fatal.
  let state = match AppState::from_env() {
    Ok(s) => Arc::new(s),
    Err(e) => {
      error!(target: "mathnav_backend", error = %e, "Startup failed");
      return Err(e.into());
    }
  };

  let _sweeper = state.spawn_session_sweeper();
  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathnav_backend", %addr, standards = state.tutor.graph.len(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "mathnav_backend", error = %e, "Failed to listen for ctrl-c");
    return;
  }
  info!(target: "mathnav_backend", "Shutdown signal received");
}
