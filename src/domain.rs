//! Domain models: difficulty, question types, questions, exams and the
//! per-invocation generation request.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QuestionBounds;
use crate::encoder::UploadedFile;
use crate::error::GenerationError;

/// How hard the generated questions should be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Difficulty {
  type Err = GenerationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Difficulty::ALL
      .into_iter()
      .find(|d| d.label().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| GenerationError::InvalidRequest(format!("Unknown difficulty '{}'", s.trim())))
  }
}

/// Closed set of question kinds. Wire labels match what the model is asked to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
  #[serde(rename = "MCQ")]
  MultipleChoice,
  ShortAnswer,
  Essay,
}

impl QuestionType {
  pub const ALL: [QuestionType; 3] =
    [QuestionType::MultipleChoice, QuestionType::ShortAnswer, QuestionType::Essay];

  pub fn label(self) -> &'static str {
    match self {
      QuestionType::MultipleChoice => "MCQ",
      QuestionType::ShortAnswer => "ShortAnswer",
      QuestionType::Essay => "Essay",
    }
  }
}

impl fmt::Display for QuestionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for QuestionType {
  type Err = GenerationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    QuestionType::ALL
      .into_iter()
      .find(|t| t.label().eq_ignore_ascii_case(s))
      .ok_or_else(|| GenerationError::InvalidRequest(format!("Unknown question type '{}'", s)))
  }
}

/// One exam item as produced by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub question_number: u32,
  pub question_text: String,
  pub question_type: QuestionType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
}

impl Question {
  /// Rule violations the model is not structurally prevented from making.
  /// These are reported, never enforced.
  pub fn issues(&self, requested: &[QuestionType]) -> Vec<String> {
    let mut out = vec![];
    if self.question_number == 0 {
      out.push("questionNumber must be positive".to_string());
    }
    if self.question_text.trim().is_empty() {
      out.push("questionText is empty".to_string());
    }
    if self.correct_answer.trim().is_empty() {
      out.push("correctAnswer is empty".to_string());
    }
    if !requested.is_empty() && !requested.contains(&self.question_type) {
      out.push(format!("questionType {} was not requested", self.question_type));
    }
    if self.question_type == QuestionType::MultipleChoice {
      match &self.options {
        None => out.push("MCQ without options".to_string()),
        Some(opts) => {
          if opts.len() != 4 {
            out.push(format!("MCQ has {} options, expected 4", opts.len()));
          }
          let distinct: HashSet<&str> = opts.iter().map(|o| o.as_str()).collect();
          if distinct.len() != opts.len() {
            out.push("MCQ options are not distinct".to_string());
          }
          if !opts.iter().any(|o| o == &self.correct_answer) {
            out.push("correctAnswer is not one of the options".to_string());
          }
        }
      }
    }
    out
  }
}

/// The generated artifact. Never mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
  pub id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
  pub questions: Vec<Question>,
}

impl Exam {
  /// Questions in display order. The stored order is whatever the model returned.
  pub fn sorted_questions(&self) -> Vec<&Question> {
    let mut qs: Vec<&Question> = self.questions.iter().collect();
    qs.sort_by_key(|q| q.question_number);
    qs
  }
}

/// Everything one generation needs. Built per user action, consumed once.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub file: UploadedFile,
  pub difficulty: Difficulty,
  pub question_types: Vec<QuestionType>,
  pub number_of_questions: u32,
}

impl GenerationRequest {
  /// Validate caller input: types non-empty (duplicates dropped, order kept)
  /// and count inside the configured bounds.
  pub fn new(
    file: UploadedFile,
    difficulty: Difficulty,
    question_types: Vec<QuestionType>,
    number_of_questions: u32,
    bounds: &QuestionBounds,
  ) -> Result<Self, GenerationError> {
    let mut seen = HashSet::new();
    let question_types: Vec<QuestionType> =
      question_types.into_iter().filter(|t| seen.insert(*t)).collect();

    if question_types.is_empty() {
      return Err(GenerationError::InvalidRequest("Select at least one question type.".into()));
    }
    if !bounds.contains(number_of_questions) {
      return Err(GenerationError::InvalidRequest(format!(
        "Number of questions must be between {} and {}.",
        bounds.min, bounds.max
      )));
    }
    Ok(Self { file, difficulty, question_types, number_of_questions })
  }
}
