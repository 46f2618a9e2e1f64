use serde::{Deserialize, Serialize};

use crate::action::Action;

/// What the pipeline does when a step's content cannot be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
  /// Render the error inside the step's content and keep going.
  #[default]
  Inline,
  /// Stop the pipeline at the failing step.
  Halt,
}

/// Cosmetic delays applied between and during steps.
///
/// None of these affect what the pipeline produces, only how fast it
/// appears to progress to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
  pub enabled: bool,
  /// Simulated pointer moves for navigation, run back to back.
  pub navigate_moves_ms: Vec<u64>,
  pub fetch_dwell_ms: u64,
  pub analyze_dwell_ms: u64,
  /// Extra delay after each analysis fragment.
  pub analyze_chunk_delay_ms: u64,
  pub compose_dwell_ms: u64,
  pub persist_dwell_ms: u64,
}

impl Default for PacingConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      navigate_moves_ms: vec![600, 800],
      fetch_dwell_ms: 600,
      analyze_dwell_ms: 1000,
      analyze_chunk_delay_ms: 20,
      compose_dwell_ms: 800,
      persist_dwell_ms: 1000,
    }
  }
}

impl PacingConfig {
  /// No delays at all.
  pub fn disabled() -> Self {
    Self {
      enabled: false,
      ..Self::default()
    }
  }

  /// Delays (in order) to wait after the given action's handler returns.
  pub fn dwell_ms(&self, action: Action) -> Vec<u64> {
    if !self.enabled {
      return Vec::new();
    }
    match action {
      Action::Navigate => self.navigate_moves_ms.clone(),
      Action::FetchData => vec![self.fetch_dwell_ms],
      Action::Analyze => vec![self.analyze_dwell_ms],
      Action::Compose => vec![self.compose_dwell_ms],
      Action::Persist => vec![self.persist_dwell_ms],
    }
  }

  /// Per-fragment throttle while streaming the given action.
  pub fn chunk_delay_ms(&self, action: Action) -> u64 {
    match action {
      Action::Analyze if self.enabled => self.analyze_chunk_delay_ms,
      _ => 0,
    }
  }
}

/// Settings for the final persistence step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
  /// Display name of the saved document.
  pub artifact_name: String,
  /// Additional attempts after a failed append.
  pub retry_attempts: u32,
  pub retry_backoff_ms: u64,
  /// Maximum length of the artifact summary, in characters.
  pub summary_chars: usize,
}

impl Default for PersistConfig {
  fn default() -> Self {
    Self {
      artifact_name: "Financial_Analysis_Report.docx".to_string(),
      retry_attempts: 0,
      retry_backoff_ms: 500,
      summary_chars: 160,
    }
  }
}
