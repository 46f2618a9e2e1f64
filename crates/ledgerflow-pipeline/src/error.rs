//! Pipeline errors.

use ledgerflow_config::{Action, ConfigError};
use ledgerflow_producer::ProducerError;

use crate::step::StepStatus;

/// Errors that can occur while a step produces its content.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
  /// The producer failed to start or broke mid-stream.
  #[error("producer failed during {action}: {source}")]
  Producer {
    action: Action,
    #[source]
    source: ProducerError,
  },

  /// The stream did not finish in time.
  #[error("{action} timed out after {timeout_ms} ms")]
  Timeout { action: Action, timeout_ms: u64 },

  /// The artifact could not be stored.
  #[error("failed to persist artifact to '{container}': {source}")]
  Persist {
    container: String,
    #[source]
    source: ledgerflow_artifact::Error,
  },

  /// The sink could not list its containers.
  #[error("failed to list artifact containers: {0}")]
  Containers(#[source] ledgerflow_artifact::Error),

  /// The sink has nowhere to put the artifact.
  #[error("no container available for the artifact")]
  NoContainer,

  /// The step tried an illegal state change.
  #[error(transparent)]
  State(#[from] StateError),
}

/// Illegal changes to pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
  #[error("step {index} cannot move from {from:?} to {to:?}")]
  InvalidTransition {
    index: usize,
    from: StepStatus,
    to: StepStatus,
  },

  #[error("step index {index} out of range (pipeline has {len} steps)")]
  OutOfRange { index: usize, len: usize },

  #[error("cursor is at {cursor}, expected {expected}")]
  CursorMismatch { cursor: usize, expected: usize },

  #[error("memory slot '{slot}' was already written")]
  SlotAlreadyWritten { slot: &'static str },
}

/// Errors surfaced by the driver.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  /// A step failed under the halt policy.
  #[error("pipeline halted at step {index}: {source}")]
  Halted {
    index: usize,
    #[source]
    source: StepError,
  },

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Config(#[from] ConfigError),
}
