//! Application state: config, the generation orchestrator and the history store.
//!
//! The model client is optional. Without a GEMINI_API_KEY the service still
//! starts; generation requests then fail with a configuration error.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::gemini::{ExamModel, Gemini};
use crate::generation::GenerationClient;
use crate::history::{ExamHistory, HistoryStore, JsonFileHistory};
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Build state from config: file-backed history, Gemini client if a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: AppConfig) -> Self {
        let model: Option<Arc<dyn ExamModel>> = match Gemini::from_config(&config.gemini) {
            Ok(Some(g)) => {
                info!(target: "exaprep_backend", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
                Some(Arc::new(g))
            }
            Ok(None) => {
                warn!(target: "exaprep_backend", "Gemini disabled (no GEMINI_API_KEY). Generation requests will be rejected.");
                None
            }
            Err(e) => {
                error!(target: "exaprep_backend", error = %e, "Gemini disabled: failed to build its HTTP client. Generation requests will be rejected.");
                None
            }
        };

        info!(target: "history", path = %config.history_path.display(), "Using file-backed exam history");
        let history: Arc<dyn HistoryStore> = Arc::new(JsonFileHistory::new(config.history_path.clone()));

        Self::with_parts(config, GenerationClient::new(model), history)
    }

    /// Assemble state from explicit collaborators.
    pub fn with_parts(config: AppConfig, client: GenerationClient, history: Arc<dyn HistoryStore>) -> Self {
        Self { config, orchestrator: Arc::new(Orchestrator::new(client, history)) }
    }

    pub fn history(&self) -> &ExamHistory {
        self.orchestrator.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;

    fn config_with(key: Option<&str>) -> AppConfig {
        let key = key.map(str::to_string);
        AppConfig::from_parts(FileConfig::default(), move |k: &str| {
            (k == "GEMINI_API_KEY").then(|| key.clone()).flatten()
        })
    }

    #[test]
    fn model_is_enabled_only_with_a_key() {
        let state = AppState::new(config_with(Some("test-key")));
        assert!(state.orchestrator.client().is_configured());
        assert_eq!(state.orchestrator.client().model_name(), Some("gemini-2.5-flash"));

        let state = AppState::new(config_with(None));
        assert!(!state.orchestrator.client().is_configured());
    }
}
