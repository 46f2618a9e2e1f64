use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Mime type of a Word-processor document.
pub const WORD_MIME_TYPE: &str =
  "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A finished document ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
  pub id: String,
  pub name: String,
  pub mime_type: String,
  /// Human readable payload size, e.g. "2.4 KB".
  pub size_label: String,
  pub created_at: DateTime<Utc>,
  pub content_base64: String,
  pub summary: String,
}

impl Artifact {
  /// Build a Word document artifact from text content.
  ///
  /// The summary is the first line of content with text, cut to
  /// `summary_chars` characters.
  pub fn word_document(name: impl Into<String>, content: &str, summary_chars: usize) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.into(),
      mime_type: WORD_MIME_TYPE.to_string(),
      size_label: size_label(content.len()),
      created_at: Utc::now(),
      content_base64: STANDARD.encode(content.as_bytes()),
      summary: summarize(content, summary_chars),
    }
  }

  /// Decode the payload back to text.
  pub fn decode_content(&self) -> Result<String, Error> {
    let bytes = STANDARD
      .decode(&self.content_base64)
      .map_err(|e| Error::InvalidPayload {
        message: e.to_string(),
      })?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidPayload {
      message: e.to_string(),
    })
  }
}

/// Format a byte count for display.
pub fn size_label(bytes: usize) -> String {
  const KB: f64 = 1024.0;
  const MB: f64 = KB * 1024.0;

  let b = bytes as f64;
  if b < KB {
    format!("{} B", bytes)
  } else if b < MB {
    format!("{:.1} KB", b / KB)
  } else {
    format!("{:.1} MB", b / MB)
  }
}

fn summarize(content: &str, max_chars: usize) -> String {
  let line = content
    .lines()
    .map(|l| l.trim_start_matches('#').trim())
    .find(|l| !l.is_empty())
    .unwrap_or_default();

  if line.chars().count() <= max_chars {
    return line.to_string();
  }
  let mut cut: String = line.chars().take(max_chars).collect();
  cut.push('…');
  cut
}
