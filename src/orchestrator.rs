//! Generation orchestrator: observable `idle -> generating -> succeeded|failed`
//! state around the generation client, with at most one run in flight.
//!
//! A second `generate` while one is running is rejected with `Busy`. The run
//! itself happens on a spawned task, so a caller that goes away (closed HTTP
//! request, dropped socket) still leaves the state in a terminal outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::domain::{Exam, GenerationRequest};
use crate::error::{GenerationError, UNKNOWN_ERROR_MESSAGE};
use crate::generation::GenerationClient;
use crate::history::{ExamHistory, HistoryStore};

/// Current generation state as shown to clients.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationState {
  #[default]
  Idle,
  Generating {
    #[serde(rename = "startedAt")]
    started_at: DateTime<Utc>,
  },
  Succeeded { exam: Exam },
  Failed { kind: String, message: String },
}

impl GenerationState {
  pub fn is_generating(&self) -> bool { matches!(self, GenerationState::Generating { .. }) }
}

pub struct Orchestrator {
  client: GenerationClient,
  history: ExamHistory,
  state: Mutex<GenerationState>,
}

impl Orchestrator {
  pub fn new(client: GenerationClient, history: Arc<dyn HistoryStore>) -> Self {
    Self { client, history: ExamHistory::new(history), state: Mutex::new(GenerationState::Idle) }
  }

  pub fn client(&self) -> &GenerationClient { &self.client }

  pub fn history(&self) -> &ExamHistory { &self.history }

  pub async fn state(&self) -> GenerationState { self.state.lock().await.clone() }

  /// Run one generation to completion and return its outcome.
  #[instrument(level = "info", skip_all, fields(file = %req.file.name))]
  pub async fn generate(self: &Arc<Self>, req: GenerationRequest) -> Result<Exam, GenerationError> {
    {
      let mut state = self.state.lock().await;
      if state.is_generating() {
        warn!(target: "generation", "Rejected generation: another one is in flight");
        return Err(GenerationError::Busy);
      }
      // Clears any previous result and error.
      *state = GenerationState::Generating { started_at: Utc::now() };
    }

    let this = Arc::clone(self);
    let task = tokio::spawn(async move {
      let outcome = this.client.generate(&req).await;
      this.finish(&outcome).await;
      outcome
    });

    match task.await {
      Ok(outcome) => outcome,
      Err(join_err) => {
        // The task panicked; make sure the state does not stay `Generating`.
        error!(target: "generation", error = %join_err, "Generation task aborted");
        let err = GenerationError::Provider(format!("generation task aborted: {join_err}"));
        *self.state.lock().await = GenerationState::Failed {
          kind: err.kind().to_string(),
          message: UNKNOWN_ERROR_MESSAGE.to_string(),
        };
        Err(err)
      }
    }
  }

  async fn finish(&self, outcome: &Result<Exam, GenerationError>) {
    let next = match outcome {
      Ok(exam) => {
        if let Err(e) = self.history.record(exam.clone()).await {
          error!(target: "history", exam_id = %exam.id, error = %e, "Failed to record exam in history");
        }
        info!(target: "generation", exam_id = %exam.id, "Generation succeeded");
        GenerationState::Succeeded { exam: exam.clone() }
      }
      Err(e) => {
        error!(target: "generation", kind = e.kind(), detail = e.detail().unwrap_or(""), "Generation failed: {}", e);
        GenerationState::Failed { kind: e.kind().to_string(), message: e.user_message() }
      }
    };
    *self.state.lock().await = next;
  }
}
