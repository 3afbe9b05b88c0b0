//! WebSocket upgrade + message loop. Each connection owns one learner session; each
//! client message is parsed as JSON, applied to that session, and answered with a
//! single JSON message. Messages are handled one at a time, in arrival order.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::{Command, Tutor};
use crate::protocol::{reply_for, to_view, ClientWsMessage, ServerWsMessage};
use crate::session::SessionState;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathnav_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "mathnav_backend", "WebSocket connected");
  let tutor = &state.tutor;
  let mut session = tutor.new_session();

  // Greet with the initial state (and first question when auto-generating).
  let greeting = if tutor.settings.auto_generate {
    let effects = tutor.dispatch(&mut session, Command::RequestQuestion).await;
    reply_for(tutor, &session, &effects)
  } else {
    ServerWsMessage::State { view: to_view(tutor, &session) }
  };
  if send_json(&mut socket, &greeting).await.is_err() {
    return;
  }

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "mathnav_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, tutor, &mut session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        if send_json(&mut socket, &reply_msg).await.is_err() {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "mathnav_backend", standard = %session.current_standard_id, "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "mathnav_backend", error = %e, "WS send error");
    e
  })
}

#[instrument(level = "info", skip(tutor, session))]
async fn handle_client_ws(msg: ClientWsMessage, tutor: &Tutor, session: &mut SessionState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,
    ClientWsMessage::GetState => ServerWsMessage::State { view: to_view(tutor, session) },
    other => match other.into_command() {
      Some(cmd) => {
        let effects = tutor.dispatch(session, cmd).await;
        reply_for(tutor, session, &effects)
      }
      None => ServerWsMessage::Error { message: "Unsupported message".into() },
    },
  }
}
