use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::ConfigError;
use crate::policy::{ErrorPolicy, PacingConfig, PersistConfig};

/// One step of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub action: Action,
  pub description: String,
  /// Display-only locator, e.g. a simulated URL.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_ref: Option<String>,
}

impl StepDef {
  pub fn new(action: Action, description: impl Into<String>) -> Self {
    Self {
      action,
      description: description.into(),
      resource_ref: None,
    }
  }

  pub fn with_resource(mut self, resource_ref: impl Into<String>) -> Self {
    self.resource_ref = Some(resource_ref.into());
    self
  }
}

/// A complete pipeline definition.
///
/// ```json
/// {
///   "name": "Quarterly review",
///   "target_ref": "doc-1",
///   "steps": [
///     { "action": "navigate", "description": "Open the data room" },
///     { "action": "fetch_data", "description": "Read the trial balance" }
///   ],
///   "on_error": "inline"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_ref: Option<String>,
  pub steps: Vec<StepDef>,
  #[serde(default)]
  pub on_error: ErrorPolicy,
  #[serde(default)]
  pub pacing: PacingConfig,
  #[serde(default)]
  pub persist: PersistConfig,
  /// Upper bound for a single streaming step. Unbounded when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_timeout_ms: Option<u64>,
}

impl PipelineDef {
  /// The standard five step audit report pipeline.
  pub fn audit_report(target_ref: Option<String>) -> Self {
    Self {
      name: "Audit report".to_string(),
      target_ref,
      steps: vec![
        StepDef::new(Action::Navigate, "Open the client data room")
          .with_resource("https://dataroom.local/client/financials"),
        StepDef::new(Action::FetchData, "Read the trial balance spreadsheet")
          .with_resource("https://dataroom.local/client/financials/trial_balance.xlsx"),
        StepDef::new(Action::Analyze, "Analyze balances and flag anomalies"),
        StepDef::new(Action::Compose, "Draft the findings memo"),
        StepDef::new(Action::Persist, "Save the memo to the engagement file"),
      ],
      on_error: ErrorPolicy::default(),
      pacing: PacingConfig::default(),
      persist: PersistConfig::default(),
      step_timeout_ms: None,
    }
  }

  /// Parse and validate a JSON definition.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let def: PipelineDef = serde_json::from_str(json)?;
    def.validate()?;
    Ok(def)
  }

  /// Read, parse and validate a JSON definition file.
  pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    Self::from_json(&json)
  }

  /// Check structural rules.
  ///
  /// Every action except `navigate` may appear at most once: each memory
  /// slot has exactly one writer, and persistence looks up the single
  /// compose step.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.steps.is_empty() {
      return Err(ConfigError::invalid("pipeline has no steps"));
    }

    for action in [
      Action::FetchData,
      Action::Analyze,
      Action::Compose,
      Action::Persist,
    ] {
      let count = self.steps.iter().filter(|s| s.action == action).count();
      if count > 1 {
        return Err(ConfigError::invalid(format!(
          "action '{}' appears {} times, at most once is allowed",
          action, count
        )));
      }
    }

    if self.step_timeout_ms == Some(0) {
      return Err(ConfigError::invalid("step_timeout_ms must be positive"));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_audit_report_is_valid() {
    let def = PipelineDef::audit_report(Some("doc-1".to_string()));
    assert!(def.validate().is_ok());
    assert_eq!(def.steps.len(), 5);
    assert_eq!(def.steps[4].action, Action::Persist);
  }

  #[test]
  fn test_from_json_minimal() {
    let def = PipelineDef::from_json(
      r#"{
        "name": "minimal",
        "steps": [{ "action": "READ_EXCEL", "description": "read" }]
      }"#,
    )
    .unwrap();
    assert_eq!(def.steps[0].action, Action::FetchData);
    assert_eq!(def.on_error, ErrorPolicy::Inline);
    assert_eq!(def.target_ref, None);
    assert!(def.pacing.enabled);
  }

  #[test]
  fn test_rejects_empty_pipeline() {
    let err = PipelineDef::from_json(r#"{ "name": "empty", "steps": [] }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
  }

  #[test]
  fn test_rejects_duplicate_memory_writer() {
    let mut def = PipelineDef::audit_report(None);
    def.steps.push(StepDef::new(Action::Analyze, "again"));
    let err = def.validate().unwrap_err();
    assert!(err.to_string().contains("analyze"));
  }

  #[test]
  fn test_navigate_may_repeat() {
    let mut def = PipelineDef::audit_report(None);
    def.steps.insert(0, StepDef::new(Action::Navigate, "login page"));
    assert!(def.validate().is_ok());
  }

  #[test]
  fn test_rejects_malformed_json() {
    let err = PipelineDef::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn test_load_missing_file() {
    let err = PipelineDef::load("/nonexistent/ledgerflow/pipeline.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
  }
}
