//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::logic::Command;
use crate::protocol::*;
use crate::state::AppState;

fn not_found(what: &str, id: &str) -> (StatusCode, Json<serde_json::Value>) {
  (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": format!("unknown {}: {}", what, id) })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, standards: state.tutor.graph.len() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_strands(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let strands: Vec<StrandOut> = state.tutor.graph.strands().map(StrandOut::from).collect();
  Json(strands)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_strand(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> axum::response::Response {
  let graph = &state.tutor.graph;
  match graph.strand(&id) {
    Some(strand) => Json(StrandDetailOut {
      strand: strand.into(),
      members: graph.strand_members(&id).into_iter().map(StandardOut::from).collect(),
    })
    .into_response(),
    None => not_found("strand", &id).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_standard(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> axum::response::Response {
  match standard_map(&state.tutor.graph, &id) {
    Some(map) => Json(map).into_response(),
    None => not_found("standard", &id).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (id, session) = state.create_session().await;
  let mut s = session.lock().await;
  if state.tutor.settings.auto_generate {
    state.tutor.dispatch(&mut s, Command::RequestQuestion).await;
  }
  (StatusCode::CREATED, Json(SessionOut { id, view: to_view(&state.tutor, &s) }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> axum::response::Response {
  let Some(session) = state.get_session(id).await else {
    return not_found("session", &id.to_string()).into_response();
  };
  let s = session.lock().await;
  Json(to_view(&state.tutor, &s)).into_response()
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> axum::response::Response {
  if state.remove_session(id).await {
    StatusCode::NO_CONTENT.into_response()
  } else {
    not_found("session", &id.to_string()).into_response()
  }
}

#[instrument(level = "info", skip(state, cmd), fields(%id, command = ?cmd))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(cmd): Json<Command>,
) -> axum::response::Response {
  let Some(session) = state.get_session(id).await else {
    return not_found("session", &id.to_string()).into_response();
  };
  // Held across the provider call: events on one session are strictly ordered.
  let mut s = session.lock().await;
  let effects = state.tutor.dispatch(&mut s, cmd).await;
  let out = EventOut::new(&state.tutor, &s, &effects);
  info!(target: "session", %id, phase = s.phase().as_str(), rejected = out.rejected.is_some(), "HTTP event applied");
  Json(out).into_response()
}
