//! Steps and their lifecycle.

use ledgerflow_config::{Action, StepDef};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Lifecycle of a step. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Pending,
  Running,
  Done,
}

impl StepStatus {
  /// Whether `self -> next` is a legal single transition.
  pub fn can_advance_to(self, next: StepStatus) -> bool {
    matches!(
      (self, next),
      (StepStatus::Pending, StepStatus::Running) | (StepStatus::Running, StepStatus::Done)
    )
  }
}

/// How a finished step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
  Completed,
  /// Content failed, the error was rendered inline and the pipeline went on.
  Recovered { error: String },
  /// Content failed and the pipeline stopped here.
  Failed { error: String },
}

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub action: Action,
  pub status: StepStatus,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resource_ref: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_preview: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome: Option<StepOutcome>,
}

impl Step {
  pub fn new(action: Action, description: impl Into<String>) -> Self {
    Self {
      action,
      status: StepStatus::Pending,
      description: description.into(),
      resource_ref: None,
      content_preview: None,
      outcome: None,
    }
  }

  pub(crate) fn advance(&mut self, index: usize, next: StepStatus) -> Result<(), StateError> {
    if !self.status.can_advance_to(next) {
      return Err(StateError::InvalidTransition {
        index,
        from: self.status,
        to: next,
      });
    }
    self.status = next;
    Ok(())
  }

  pub(crate) fn append_preview(&mut self, fragment: &str) {
    self
      .content_preview
      .get_or_insert_with(String::new)
      .push_str(fragment);
  }
}

impl From<&StepDef> for Step {
  fn from(def: &StepDef) -> Self {
    Self {
      resource_ref: def.resource_ref.clone(),
      ..Step::new(def.action, def.description.clone())
    }
  }
}
