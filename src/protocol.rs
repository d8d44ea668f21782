//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QuestionBounds;
use crate::domain::{Difficulty, Exam, QuestionType};
use crate::orchestrator::GenerationState;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Generate(GenerateIn),
    Status,
    History,
    OpenExam {
        #[serde(rename = "examId")]
        exam_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    GenerationState {
        state: GenerationState,
    },
    Exam {
        exam: Exam,
    },
    History {
        exams: Vec<ExamSummary>,
    },
    Error {
        message: String,
        kind: String,
    },
}

/// Generation request as JSON (WebSocket). The HTTP endpoint takes multipart instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    pub file_base64: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub question_types: Vec<String>,
    #[serde(default)]
    pub number_of_questions: Option<u32>,
}

/// History list entry.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub question_count: usize,
}

pub fn to_summary(e: &Exam) -> ExamSummary {
    ExamSummary {
        id: e.id.clone(),
        title: e.title.clone(),
        created_at: e.created_at,
        question_count: e.questions.len(),
    }
}

/// Copy of an exam with questions in display order (by `questionNumber`).
pub fn to_view(e: &Exam) -> Exam {
    Exam {
        questions: e.sorted_questions().into_iter().cloned().collect(),
        ..e.clone()
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub model_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Choices the UI offers, with the configured bounds.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsOut {
    pub difficulties: Vec<Difficulty>,
    pub question_types: Vec<QuestionType>,
    pub min_questions: u32,
    pub max_questions: u32,
    pub defaults: DefaultsOut,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsOut {
    pub difficulty: Difficulty,
    pub question_types: Vec<QuestionType>,
    pub number_of_questions: u32,
}

pub fn options_out(bounds: &QuestionBounds) -> OptionsOut {
    OptionsOut {
        difficulties: Difficulty::ALL.to_vec(),
        question_types: QuestionType::ALL.to_vec(),
        min_questions: bounds.min,
        max_questions: bounds.max,
        defaults: DefaultsOut {
            difficulty: Difficulty::default(),
            question_types: vec![QuestionType::MultipleChoice],
            number_of_questions: bounds.default,
        },
    }
}

#[derive(Serialize)]
pub struct ClearedOut {
    pub cleared: bool,
}
