//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{
    multipart::{Field, MultipartError},
    Multipart, Path, State,
  },
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::encoder::UploadedFile;
use crate::error::GenerationError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let client = state.orchestrator.client();
  Json(HealthOut {
    ok: true,
    model_configured: client.is_configured(),
    model: client.model_name().map(str::to_string),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_options(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(options_out(&state.config.bounds))
}

/// Multipart fields: `file` (required), `difficulty`, `questionTypes`
/// (repeatable or comma separated), `numberOfQuestions`.
#[instrument(level = "info", skip(state, multipart))]
pub async fn http_post_exam(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Response, GenerationError> {
  let mut file: Option<UploadedFile> = None;
  let mut params = RawParams::default();

  while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
    let name = field.name().unwrap_or_default().to_string();
    match name.as_str() {
      "file" => {
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(unreadable_file)?;
        ensure_within_cap(bytes.len(), state.config.max_upload_bytes)?;
        file = Some(UploadedFile::new(name, mime, bytes.to_vec()));
      }
      "difficulty" => params.difficulty = Some(text_of(field).await?),
      "questionTypes" | "questionTypes[]" => params.question_types.push(text_of(field).await?),
      "numberOfQuestions" => params.number_of_questions = Some(text_of(field).await?),
      _ => {}
    }
  }

  let file = file.ok_or_else(|| GenerationError::InvalidRequest("Please upload a file first.".into()))?;
  let req = build_request(&state.config.bounds, file, params)?;
  let exam = generate_exam(&state, req).await?;
  info!(target: "generation", id = %exam.id, questions = exam.questions.len(), "HTTP exam generated");
  Ok((StatusCode::CREATED, Json(exam)).into_response())
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_generation(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.orchestrator.state().await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(list_history(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_history_exam(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match open_exam(&state, &id).await {
    Some(exam) => Json(to_view(&exam)).into_response(),
    None => (
      StatusCode::NOT_FOUND,
      Json(json!({ "error": format!("Unknown exam id: {id}"), "kind": "not_found" })),
    )
      .into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_history(State(state): State<Arc<AppState>>) -> Response {
  match clear_history(&state).await {
    Ok(()) => Json(ClearedOut { cleared: true }).into_response(),
    Err(e) => e.into_response(),
  }
}

async fn text_of(field: Field<'_>) -> Result<String, GenerationError> {
  field.text().await.map_err(bad_multipart)
}

fn bad_multipart(e: MultipartError) -> GenerationError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    return GenerationError::UploadTooLarge(e.body_text());
  }
  GenerationError::InvalidRequest(format!("Invalid upload: {}", e.body_text()))
}

fn unreadable_file(e: MultipartError) -> GenerationError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    return GenerationError::UploadTooLarge(e.body_text());
  }
  GenerationError::FileRead(e.body_text())
}
