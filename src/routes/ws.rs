//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request;
//! clients poll `status` from another connection while a `generate` runs.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::GenerationError;
use crate::logic::*;
use crate::protocol::{to_view, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "exaprep_backend", "WebSocket upgrade requested");
  ws.max_message_size(state.config.ws_message_limit())
    .on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "exaprep_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "exaprep_backend", kind = message_kind(&incoming), "WS received");
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), kind: "invalid_request".into() },
        };

        if send_json(&mut socket, &reply).await.is_err() { break; }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "exaprep_backend", "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e), "kind": "internal" }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "exaprep_backend", error = %e, "WS send error");
    e
  })
}

fn message_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::Generate(_) => "generate",
    ClientWsMessage::Status => "status",
    ClientWsMessage::History => "history",
    ClientWsMessage::OpenExam { .. } => "open_exam",
  }
}

fn error_msg(e: &GenerationError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.user_message(), kind: e.kind().into() }
}

#[instrument(level = "info", skip(state, msg))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Generate(body) => {
      let req = match build_request_from_ws(&state.config.bounds, state.config.max_upload_bytes, body) {
        Ok(req) => req,
        Err(e) => return error_msg(&e),
      };
      match generate_exam(state, req).await {
        Ok(exam) => {
          info!(target: "generation", id = %exam.id, "WS exam generated");
          ServerWsMessage::Exam { exam }
        }
        Err(e) => error_msg(&e),
      }
    }

    ClientWsMessage::Status => ServerWsMessage::GenerationState { state: state.orchestrator.state().await },

    ClientWsMessage::History => ServerWsMessage::History { exams: list_history(state).await },

    ClientWsMessage::OpenExam { exam_id } => match open_exam(state, &exam_id).await {
      Some(exam) => ServerWsMessage::Exam { exam: to_view(&exam) },
      None => ServerWsMessage::Error { message: format!("Unknown exam id: {}", exam_id), kind: "not_found".into() },
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::config::{AppConfig, FileConfig};
  use crate::generation::tests::{algebra_payload, ScriptedModel};
  use crate::generation::GenerationClient;
  use crate::history::MemoryHistory;

  fn state() -> AppState {
    let model = ScriptedModel::new(vec![ScriptedModel::text(&algebra_payload())]);
    AppState::with_parts(
      AppConfig::from_parts(FileConfig::default(), |_| None),
      GenerationClient::new(Some(Arc::new(model))),
      Arc::new(MemoryHistory::default()),
    )
  }

  fn parse(json: &str) -> ClientWsMessage {
    serde_json::from_str(json).unwrap()
  }

  #[tokio::test]
  async fn generate_then_open_from_history() {
    let state = state();
    let msg = parse(r#"{"type":"generate","fileName":"a.txt","fileBase64":"aGVsbG8=","questionTypes":["MCQ"],"numberOfQuestions":5}"#);
    let id = match handle_client_ws(msg, &state).await {
      ServerWsMessage::Exam { exam } => exam.id,
      other => panic!("unexpected reply {other:?}"),
    };

    match handle_client_ws(parse(r#"{"type":"history"}"#), &state).await {
      ServerWsMessage::History { exams } => assert_eq!(exams[0].id, id),
      other => panic!("unexpected reply {other:?}"),
    }
    let open = format!(r#"{{"type":"open_exam","examId":"{id}"}}"#);
    assert!(matches!(handle_client_ws(parse(&open), &state).await, ServerWsMessage::Exam { .. }));
  }

  #[tokio::test]
  async fn invalid_generate_reports_error_kind() {
    let state = state();
    let msg = parse(r#"{"type":"generate","fileName":"a.txt","fileBase64":"aGVsbG8=","numberOfQuestions":99}"#);
    match handle_client_ws(msg, &state).await {
      ServerWsMessage::Error { kind, .. } => assert_eq!(kind, "invalid_request"),
      other => panic!("unexpected reply {other:?}"),
    }
  }

  #[tokio::test]
  async fn status_and_ping() {
    let state = state();
    assert!(matches!(handle_client_ws(parse(r#"{"type":"ping"}"#), &state).await, ServerWsMessage::Pong));
    let reply = handle_client_ws(parse(r#"{"type":"status"}"#), &state).await;
    let v = serde_json::to_value(&reply).unwrap();
    assert_eq!(v["type"], "generation_state");
    assert_eq!(v["state"]["status"], "idle");
  }
}
