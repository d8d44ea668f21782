//! Service configuration: environment variables, optionally overlaid by a TOML
//! file at EXAPREP_CONFIG_PATH.
//!
//! The Gemini credential is only ever read from the environment.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Room for form fields, part headers and the JSON envelope around an upload.
const ENVELOPE_OVERHEAD_BYTES: usize = 64 * 1024;

/// Allowed range for the requested number of questions.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuestionBounds {
  #[serde(rename = "min_questions")]
  pub min: u32,
  #[serde(rename = "max_questions")]
  pub max: u32,
  #[serde(rename = "default_questions")]
  pub default: u32,
}

impl Default for QuestionBounds {
  fn default() -> Self { Self { min: 5, max: 15, default: 7 } }
}

impl QuestionBounds {
  pub fn contains(&self, n: u32) -> bool { n >= self.min && n <= self.max }

  /// Repair inverted or out-of-range values from a hand-written config.
  fn normalized(mut self) -> Self {
    if self.min == 0 { self.min = 1; }
    if self.max < self.min { self.max = self.min; }
    self.default = self.default.clamp(self.min, self.max);
    self
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HistoryCfg {
  pub path: PathBuf,
}

impl Default for HistoryCfg {
  fn default() -> Self { Self { path: PathBuf::from("data/exam_history.json") } }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
  pub max_upload_mb: usize,
}

impl Default for ServerCfg {
  fn default() -> Self { Self { max_upload_mb: 20 } }
}

/// Shape of the optional TOML file.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub generation: QuestionBounds,
  #[serde(default)]
  pub history: HistoryCfg,
  #[serde(default)]
  pub server: ServerCfg,
}

/// Connection settings for the Gemini endpoint.
#[derive(Clone, Debug)]
pub struct GeminiCfg {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub gemini: GeminiCfg,
  pub bounds: QuestionBounds,
  pub history_path: PathBuf,
  pub max_upload_bytes: usize,
}

impl AppConfig {
  pub fn from_env() -> Self {
    let file = load_file_config_from_env().unwrap_or_default();
    Self::from_parts(file, |k| std::env::var(k).ok())
  }

  /// Combine a parsed file config with an env lookup. Split out for tests.
  pub fn from_parts(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
    let non_empty = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = non_empty("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(3000);
    let gemini = GeminiCfg {
      api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")),
      base_url: non_empty("GEMINI_BASE_URL")
        .unwrap_or_else(|| DEFAULT_BASE_URL.into())
        .trim_end_matches('/')
        .to_string(),
      model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
      timeout_secs: non_empty("GEMINI_TIMEOUT_SECS")
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    Self {
      port,
      gemini,
      bounds: file.generation.normalized(),
      history_path: file.history.path,
      max_upload_bytes: file.server.max_upload_mb.max(1) * 1024 * 1024,
    }
  }

  /// Request body cap for the multipart upload endpoint.
  pub fn multipart_body_limit(&self) -> usize { self.max_upload_bytes + ENVELOPE_OVERHEAD_BYTES }

  /// WebSocket message cap. Files arrive base64 encoded there, a third larger.
  pub fn ws_message_limit(&self) -> usize { self.max_upload_bytes.div_ceil(3) * 4 + ENVELOPE_OVERHEAD_BYTES }
}

/// Attempt to load `FileConfig` from EXAPREP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("EXAPREP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<FileConfig>(&s) {
      Ok(cfg) => {
        info!(target: "exaprep_backend", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "exaprep_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "exaprep_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
