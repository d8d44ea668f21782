//! Uploaded-file handling: turns raw bytes into the inline base64 part the
//! model endpoint accepts.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

use crate::error::GenerationError;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// A file as received from the client.
#[derive(Clone, Debug)]
pub struct UploadedFile {
  pub name: String,
  pub media_type: String,
  pub bytes: Vec<u8>,
}

impl UploadedFile {
  /// An empty or missing declared type is inferred from the file name.
  pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
    let name = name.into();
    let declared = media_type.into();
    let media_type = if declared.trim().is_empty() {
      guess_media_type(&name).to_string()
    } else {
      declared.trim().to_string()
    };
    Self { name, media_type, bytes }
  }
}

/// Transport-safe file payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFile {
  pub mime_type: String,
  pub data: String,
}

pub fn encode(file: &UploadedFile) -> InlineFile {
  InlineFile { mime_type: file.media_type.clone(), data: BASE64.encode(&file.bytes) }
}

/// Decode a base64 upload (WebSocket clients send files this way).
pub fn decode_base64(data: &str) -> Result<Vec<u8>, GenerationError> {
  // Tolerate data URLs ("data:application/pdf;base64,....").
  let payload = match data.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => data,
  };
  BASE64
    .decode(payload.trim())
    .map_err(|e| GenerationError::FileRead(format!("payload is not valid base64 ({e})")))
}

pub fn guess_media_type(file_name: &str) -> &'static str {
  let ext = Path::new(file_name)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "pdf" => "application/pdf",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "txt" => "text/plain",
    "md" => "text/markdown",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => FALLBACK_MEDIA_TYPE,
  }
}
