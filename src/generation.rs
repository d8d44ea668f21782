//! Generation client: one model call per request, then strict validation of
//! the untyped reply into an `Exam`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Exam, GenerationRequest, Question, QuestionType};
use crate::encoder::encode;
use crate::error::GenerationError;
use crate::gemini::{ExamModel, ModelCall, ModelReply};
use crate::prompt::build_prompt;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct GenerationClient {
  model: Option<Arc<dyn ExamModel>>,
}

impl GenerationClient {
  /// `None` means no credential: every `generate` fails with `Configuration`.
  pub fn new(model: Option<Arc<dyn ExamModel>>) -> Self { Self { model } }

  pub fn is_configured(&self) -> bool { self.model.is_some() }

  pub fn model_name(&self) -> Option<&str> { self.model.as_deref().map(|m| m.name()) }

  #[instrument(
    level = "info",
    skip(self, req),
    fields(difficulty = %req.difficulty, count = req.number_of_questions, file = %req.file.name, bytes = req.file.bytes.len())
  )]
  pub async fn generate(&self, req: &GenerationRequest) -> Result<Exam, GenerationError> {
    let model = self.model.as_ref().ok_or(GenerationError::Configuration)?;

    let file = encode(&req.file);
    let prompt = build_prompt(req.difficulty, &req.question_types, req.number_of_questions);
    let call = ModelCall { instructions: prompt.instructions, file, schema: prompt.schema };

    let reply = model.generate_content(call).await?;
    let exam = exam_from_reply(reply)?;

    for warning in quality_warnings(&exam, &req.question_types, req.number_of_questions) {
      warn!(target: "generation", exam_id = %exam.id, %warning, "Generated exam deviates from the request");
    }
    info!(target: "generation", exam_id = %exam.id, questions = exam.questions.len(), title = %trunc_for_log(&exam.title, 60), "Exam generated");
    Ok(exam)
  }
}

/// Turn a raw model reply into an `Exam`, or the matching failure kind.
pub fn exam_from_reply(reply: ModelReply) -> Result<Exam, GenerationError> {
  if let Some(reason) = reply.block_reason {
    return Err(GenerationError::Blocked { reason });
  }

  let text = reply.text.unwrap_or_default();
  let text = strip_code_fence(text.trim());
  if text.is_empty() {
    return Err(GenerationError::EmptyResponse);
  }

  let parsed: Value = serde_json::from_str(text).map_err(|e| {
    GenerationError::MalformedResponse(format!("{e}; payload starts with: {}", trunc_for_log(text, 80)))
  })?;
  let (title, questions) = validate_payload(parsed)?;

  let created_at = Utc::now();
  Ok(Exam { id: new_exam_id(created_at.timestamp_millis()), title, created_at, questions })
}

/// Require a non-empty `title` and an array `questions` whose entries are
/// well-typed questions.
fn validate_payload(parsed: Value) -> Result<(String, Vec<Question>), GenerationError> {
  let Value::Object(mut obj) = parsed else {
    return Err(GenerationError::InvalidStructure("top-level value is not an object".into()));
  };

  let title = match obj.remove("title") {
    Some(Value::String(t)) if !t.trim().is_empty() => t,
    _ => return Err(GenerationError::InvalidStructure("missing or empty 'title'".into())),
  };
  let items = match obj.remove("questions") {
    Some(Value::Array(items)) => items,
    _ => return Err(GenerationError::InvalidStructure("'questions' is not an array".into())),
  };

  let questions = items
    .into_iter()
    .enumerate()
    .map(|(i, item)| {
      serde_json::from_value::<Question>(item)
        .map_err(|e| GenerationError::InvalidStructure(format!("question #{}: {e}", i + 1)))
    })
    .collect::<Result<Vec<_>, _>>()?;

  Ok((title, questions))
}

/// Remove a ```json ... ``` wrapper if the model added one anyway.
fn strip_code_fence(text: &str) -> &str {
  let Some(rest) = text.strip_prefix("```") else { return text };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn new_exam_id(millis: i64) -> String {
  format!("exam_{}_{}", millis, Uuid::new_v4().simple())
}

fn quality_warnings(exam: &Exam, requested: &[QuestionType], expected: u32) -> Vec<String> {
  let mut out = vec![];
  if exam.questions.is_empty() {
    out.push("no questions returned".to_string());
  } else if exam.questions.len() != expected as usize {
    out.push(format!("{} questions returned, {} requested", exam.questions.len(), expected));
  }
  let mut numbers: Vec<u32> = exam.questions.iter().map(|q| q.question_number).collect();
  numbers.sort_unstable();
  if numbers.windows(2).any(|w| w[0] == w[1]) {
    out.push("duplicate questionNumber values".to_string());
  }
  for q in &exam.questions {
    for issue in q.issues(requested) {
      out.push(format!("question {}: {}", q.question_number, issue));
    }
  }
  out
}
