//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Turning loosely-typed client input into a validated `GenerationRequest`
//!   - Running a generation through the orchestrator
//!   - History listing / lookup / clearing

use tracing::{info, instrument};

use crate::config::QuestionBounds;
use crate::domain::{Difficulty, Exam, GenerationRequest, QuestionType};
use crate::encoder::{decode_base64, UploadedFile};
use crate::error::{GenerationError, HistoryError};
use crate::protocol::{to_summary, ExamSummary, GenerateIn};
use crate::state::AppState;
use crate::util::split_list;

/// Raw generation parameters as they arrive from a form or JSON message.
#[derive(Debug, Default)]
pub struct RawParams {
  pub difficulty: Option<String>,
  pub question_types: Vec<String>,
  pub number_of_questions: Option<String>,
}

/// Parse and validate. Missing fields fall back to the UI defaults
/// (Medium, MCQ, configured default count); present-but-invalid fields are errors.
pub fn build_request(
  bounds: &QuestionBounds,
  file: UploadedFile,
  params: RawParams,
) -> Result<GenerationRequest, GenerationError> {
  if file.bytes.is_empty() {
    return Err(GenerationError::InvalidRequest("Please upload a non-empty file first.".into()));
  }

  let difficulty = match params.difficulty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
    Some(d) => d.parse::<Difficulty>()?,
    None => Difficulty::default(),
  };

  let mut question_types = vec![];
  for raw in &params.question_types {
    for label in split_list(raw) {
      question_types.push(label.parse::<QuestionType>()?);
    }
  }
  if params.question_types.is_empty() {
    question_types.push(QuestionType::MultipleChoice);
  }

  let number_of_questions = match params.number_of_questions.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
    Some(n) => n.parse::<u32>().map_err(|_| {
      GenerationError::InvalidRequest(format!("numberOfQuestions must be a whole number, got '{n}'"))
    })?,
    None => bounds.default,
  };

  GenerationRequest::new(file, difficulty, question_types, number_of_questions, bounds)
}

/// Reject files above the configured upload cap.
pub fn ensure_within_cap(len: usize, max_upload_bytes: usize) -> Result<(), GenerationError> {
  if len > max_upload_bytes {
    return Err(GenerationError::UploadTooLarge(format!(
      "{len} bytes exceeds the {max_upload_bytes} byte limit"
    )));
  }
  Ok(())
}

/// WebSocket variant: the file arrives base64-encoded in the message.
pub fn build_request_from_ws(
  bounds: &QuestionBounds,
  max_upload_bytes: usize,
  msg: GenerateIn,
) -> Result<GenerationRequest, GenerationError> {
  let bytes = decode_base64(&msg.file_base64)?;
  ensure_within_cap(bytes.len(), max_upload_bytes)?;
  let file = UploadedFile::new(msg.file_name, msg.mime_type, bytes);
  let params = RawParams {
    difficulty: msg.difficulty,
    question_types: msg.question_types,
    number_of_questions: msg.number_of_questions.map(|n| n.to_string()),
  };
  build_request(bounds, file, params)
}

#[instrument(level = "info", skip(state, req), fields(file = %req.file.name, difficulty = %req.difficulty))]
pub async fn generate_exam(state: &AppState, req: GenerationRequest) -> Result<Exam, GenerationError> {
  state.orchestrator.generate(req).await
}

pub async fn list_history(state: &AppState) -> Vec<ExamSummary> {
  state.history().list().await.iter().map(to_summary).collect()
}

#[instrument(level = "info", skip(state))]
pub async fn open_exam(state: &AppState, id: &str) -> Option<Exam> {
  state.history().find(id).await
}

pub async fn clear_history(state: &AppState) -> Result<(), HistoryError> {
  state.history().clear().await?;
  info!(target: "history", "Exam history cleared");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file() -> UploadedFile {
    UploadedFile::new("cells.md", "", b"# Cells".to_vec())
  }

  #[test]
  fn missing_fields_use_defaults() {
    let req = build_request(&QuestionBounds::default(), file(), RawParams::default()).unwrap();
    assert_eq!(req.difficulty, Difficulty::Medium);
    assert_eq!(req.question_types, vec![QuestionType::MultipleChoice]);
    assert_eq!(req.number_of_questions, 7);
    assert_eq!(req.file.media_type, "text/markdown");
  }

  #[test]
  fn parses_repeated_and_comma_separated_types() {
    let params = RawParams {
      difficulty: Some("Hard".into()),
      question_types: vec!["Essay".into(), "MCQ, ShortAnswer".into()],
      number_of_questions: Some("12".into()),
    };
    let req = build_request(&QuestionBounds::default(), file(), params).unwrap();
    assert_eq!(req.difficulty, Difficulty::Hard);
    assert_eq!(
      req.question_types,
      vec![QuestionType::Essay, QuestionType::MultipleChoice, QuestionType::ShortAnswer]
    );
    assert_eq!(req.number_of_questions, 12);
  }

  #[test]
  fn rejects_bad_input() {
    let bounds = QuestionBounds::default();
    let bad = [
      RawParams { number_of_questions: Some("seven".into()), ..Default::default() },
      RawParams { number_of_questions: Some("40".into()), ..Default::default() },
      RawParams { difficulty: Some("Brutal".into()), ..Default::default() },
      RawParams { question_types: vec![" , ".into()], ..Default::default() },
    ];
    for params in bad {
      assert_eq!(build_request(&bounds, file(), params).unwrap_err().kind(), "invalid_request");
    }
    let empty = UploadedFile::new("x.pdf", "", vec![]);
    assert!(build_request(&bounds, empty, RawParams::default()).is_err());
  }

  #[test]
  fn ws_request_decodes_file() {
    let msg = GenerateIn {
      file_name: "notes.txt".into(),
      mime_type: String::new(),
      file_base64: "aGVsbG8=".into(),
      difficulty: Some("Easy".into()),
      question_types: vec!["ShortAnswer".into()],
      number_of_questions: Some(5),
    };
    let req = build_request_from_ws(&QuestionBounds::default(), 1024, msg).unwrap();
    assert_eq!(req.file.bytes, b"hello");
    assert_eq!(req.file.media_type, "text/plain");
    assert_eq!(req.question_types, vec![QuestionType::ShortAnswer]);
  }

  #[test]
  fn ws_request_over_cap_is_rejected() {
    let msg = GenerateIn {
      file_name: "notes.txt".into(),
      mime_type: String::new(),
      file_base64: "aGVsbG8=".into(),
      difficulty: None,
      question_types: vec![],
      number_of_questions: None,
    };
    let err = build_request_from_ws(&QuestionBounds::default(), 4, msg).unwrap_err();
    assert_eq!(err.kind(), "upload_too_large");
    assert!(ensure_within_cap(5, 5).is_ok());
  }
}
