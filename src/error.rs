//! Error types for exam generation and history persistence.
//!
//! `GenerationError` covers every way a generation attempt can end badly.
//! Each variant renders a human-readable message suitable for showing to the
//! user as-is; `kind()` gives a stable tag for logs, tests and API clients.

use std::path::PathBuf;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

/// Shown for failures that have no more specific message.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred while generating the exam.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
  /// No API key for the model provider.
  #[error("The exam generator is not configured: set GEMINI_API_KEY (or API_KEY) and restart.")]
  Configuration,

  /// The provider refused the request for policy/safety reasons.
  #[error("The request was blocked for safety reasons ({reason}). Please try with different material.")]
  Blocked { reason: String },

  #[error("The AI returned an empty response. This could be due to the content of your file, server load, or a content policy violation. Please try again with a different file.")]
  EmptyResponse,

  /// Payload is not JSON. The parser detail is kept for logs only.
  #[error("The AI returned a response that was not in the correct format. Please try again.")]
  MalformedResponse(String),

  /// JSON, but missing `title` / `questions` or with unusable question entries.
  #[error("The AI returned an invalid data structure. Please try again.")]
  InvalidStructure(String),

  /// The upload could not be read or decoded.
  #[error("Could not read the uploaded file: {0}")]
  FileRead(String),

  /// Transport failures, non-2xx responses and anything unclassified.
  #[error("An unknown error occurred while generating the exam.")]
  Provider(String),

  #[error("{0}")]
  InvalidRequest(String),

  /// Upload exceeds the configured size cap.
  #[error("The uploaded file is too large: {0}")]
  UploadTooLarge(String),

  #[error("An exam is already being generated. Please wait for it to finish.")]
  Busy,
}

impl GenerationError {
  pub fn kind(&self) -> &'static str {
    match self {
      GenerationError::Configuration => "configuration",
      GenerationError::Blocked { .. } => "blocked",
      GenerationError::EmptyResponse => "empty_response",
      GenerationError::MalformedResponse(_) => "malformed_response",
      GenerationError::InvalidStructure(_) => "invalid_structure",
      GenerationError::FileRead(_) => "file_read",
      GenerationError::Provider(_) => "provider",
      GenerationError::InvalidRequest(_) => "invalid_request",
      GenerationError::UploadTooLarge(_) => "upload_too_large",
      GenerationError::Busy => "busy",
    }
  }

  pub fn user_message(&self) -> String { self.to_string() }

  /// Internal detail worth logging next to the user message, if any.
  pub fn detail(&self) -> Option<&str> {
    match self {
      GenerationError::MalformedResponse(d)
      | GenerationError::InvalidStructure(d)
      | GenerationError::Provider(d) => Some(d.as_str()),
      _ => None,
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      GenerationError::InvalidRequest(_) | GenerationError::FileRead(_) => StatusCode::BAD_REQUEST,
      GenerationError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      GenerationError::Busy => StatusCode::CONFLICT,
      GenerationError::Configuration => StatusCode::SERVICE_UNAVAILABLE,
      GenerationError::Blocked { .. }
      | GenerationError::EmptyResponse
      | GenerationError::MalformedResponse(_)
      | GenerationError::InvalidStructure(_)
      | GenerationError::Provider(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for GenerationError {
  fn into_response(self) -> Response {
    let body = json!({ "error": self.user_message(), "kind": self.kind() });
    (self.status(), Json(body)).into_response()
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
  #[error("History file I/O failed at '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Could not serialize exam history: {0}")]
  Serialize(#[from] serde_json::Error),
}

impl IntoResponse for HistoryError {
  fn into_response(self) -> Response {
    let body = json!({ "error": self.to_string(), "kind": "history" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_differ_per_kind() {
    let blocked = GenerationError::Blocked { reason: "SAFETY".into() };
    assert!(blocked.user_message().contains("SAFETY"));
    assert!(GenerationError::EmptyResponse.user_message().contains("different file"));
    assert_ne!(
      GenerationError::MalformedResponse("x".into()).user_message(),
      GenerationError::InvalidStructure("x".into()).user_message()
    );
  }

  #[test]
  fn provider_failures_hide_raw_payloads() {
    let e = GenerationError::Provider("HTTP 500: {\"secret\":1}".into());
    assert_eq!(e.user_message(), UNKNOWN_ERROR_MESSAGE);
    assert_eq!(e.detail(), Some("HTTP 500: {\"secret\":1}"));
    assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
  }

  #[test]
  fn status_codes_by_kind() {
    assert_eq!(GenerationError::Busy.status(), StatusCode::CONFLICT);
    assert_eq!(GenerationError::Configuration.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(GenerationError::InvalidRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(GenerationError::UploadTooLarge("x".into()).status(), StatusCode::PAYLOAD_TOO_LARGE);
  }
}
