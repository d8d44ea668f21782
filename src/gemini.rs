//! Minimal Gemini client for our single use-case: `generateContent` with one
//! inline file and a structured-output schema.
//!
//! Calls are instrumented and log model name, latency, token usage and response
//! size. We never log the API key or the uploaded file.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::GeminiCfg;
use crate::encoder::InlineFile;
use crate::error::GenerationError;

/// Finish reasons that mean the candidate was withheld by policy.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// One outbound request: instructions, the encoded file and the response schema.
#[derive(Clone, Debug)]
pub struct ModelCall {
  pub instructions: String,
  pub file: InlineFile,
  pub schema: Value,
}

/// What came back, before any validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelReply {
  pub block_reason: Option<String>,
  pub text: Option<String>,
}

/// Seam between the generation pipeline and the hosted model.
#[async_trait]
pub trait ExamModel: Send + Sync {
  fn name(&self) -> &str;

  async fn generate_content(&self, call: ModelCall) -> Result<ModelReply, GenerationError>;
}

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  /// `Ok(None)` when no API key is configured; `Err` when the HTTP client cannot be built.
  pub fn from_config(cfg: &GeminiCfg) -> Result<Option<Self>, reqwest::Error> {
    let Some(api_key) = cfg.api_key.clone() else { return Ok(None) };
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()?;
    Ok(Some(Self { client, api_key, base_url: cfg.base_url.clone(), model: cfg.model.clone() }))
  }
}

#[async_trait]
impl ExamModel for Gemini {
  fn name(&self) -> &str { &self.model }

  #[instrument(level = "info", skip(self, call), fields(model = %self.model, mime = %call.file.mime_type, file_b64_len = call.file.data.len()))]
  async fn generate_content(&self, call: ModelCall) -> Result<ModelReply, GenerationError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateContentRequest {
      contents: vec![Content {
        parts: vec![
          Part::Text { text: call.instructions },
          Part::InlineData { inline_data: call.file },
        ],
      }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: call.schema,
      },
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "exaprep-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await
      .map_err(|e| GenerationError::Provider(format!("Gemini request failed: {e}")))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "Gemini returned an error status");
      return Err(GenerationError::Provider(format!("Gemini HTTP {}: {}", status, msg)));
    }

    let body: GenerateContentResponse = res.json().await
      .map_err(|e| GenerationError::Provider(format!("Gemini response envelope unreadable: {e}")))?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidate_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let reply = body.into_reply();
    info!(elapsed = ?start.elapsed(), blocked = reply.block_reason.is_some(), text_len = reply.text.as_deref().map(str::len).unwrap_or(0), "Gemini response received");
    Ok(reply)
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { parts: Vec<Part> }
#[derive(Serialize)]
#[serde(untagged)]
enum Part {
  Text { text: String },
  InlineData {
    #[serde(rename = "inlineData")]
    inline_data: InlineFile,
  },
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)] parts: Vec<ReplyPart>,
}
#[derive(Deserialize)]
struct ReplyPart {
  #[serde(default)] text: Option<String>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  #[serde(default)] block_reason: Option<String>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateContentResponse {
  fn into_reply(self) -> ModelReply {
    let prompt_block = self.prompt_feedback.and_then(|f| f.block_reason);
    let first = self.candidates.into_iter().next();
    let candidate_block = first.as_ref()
      .and_then(|c| c.finish_reason.clone())
      .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()));
    let text = first
      .and_then(|c| c.content)
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
      .filter(|t| !t.is_empty());
    ModelReply { block_reason: prompt_block.or(candidate_block), text }
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn reply_of(v: Value) -> ModelReply {
    serde_json::from_value::<GenerateContentResponse>(v).unwrap().into_reply()
  }

  #[test]
  fn request_body_matches_wire_format() {
    let req = GenerateContentRequest {
      contents: vec![Content {
        parts: vec![
          Part::Text { text: "make an exam".into() },
          Part::InlineData { inline_data: InlineFile { mime_type: "application/pdf".into(), data: "AAA=".into() } },
        ],
      }],
      generation_config: GenerationConfig { response_mime_type: "application/json".into(), response_schema: json!({"type": "OBJECT"}) },
    };
    let v = serde_json::to_value(req).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["text"], "make an exam");
    assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["mimeType"], "application/pdf");
    assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["data"], "AAA=");
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(v["generationConfig"]["responseSchema"]["type"], "OBJECT");
  }

  #[test]
  fn concatenates_candidate_text_parts() {
    let r = reply_of(json!({
      "candidates": [{ "content": { "parts": [{ "text": "{\"ti" }, { "text": "tle\":1}" }] }, "finishReason": "STOP" }],
      "usageMetadata": { "totalTokenCount": 10 }
    }));
    assert_eq!(r.text.as_deref(), Some("{\"title\":1}"));
    assert!(r.block_reason.is_none());
  }

  #[test]
  fn surfaces_prompt_and_candidate_blocks() {
    let r = reply_of(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
    assert_eq!(r.block_reason.as_deref(), Some("SAFETY"));
    assert!(r.text.is_none());

    let r = reply_of(json!({ "candidates": [{ "finishReason": "PROHIBITED_CONTENT" }] }));
    assert_eq!(r.block_reason.as_deref(), Some("PROHIBITED_CONTENT"));

    let r = reply_of(json!({ "candidates": [{ "finishReason": "MAX_TOKENS", "content": { "parts": [] } }] }));
    assert_eq!(r, ModelReply::default());
  }

  #[test]
  fn extracts_error_message() {
    let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid"));
    assert!(extract_gemini_error("<html>").is_none());
  }

  #[test]
  fn requires_api_key() {
    let mut cfg = GeminiCfg { api_key: None, base_url: "http://x".into(), model: "m".into(), timeout_secs: 5 };
    assert!(Gemini::from_config(&cfg).unwrap().is_none());
    cfg.api_key = Some("k".into());
    let g = Gemini::from_config(&cfg).unwrap().unwrap();
    assert_eq!(g.name(), "m");
  }
}
