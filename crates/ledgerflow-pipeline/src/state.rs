//! Pipeline state.

use ledgerflow_config::{Action, PipelineDef};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::memory::Memory;
use crate::step::{Step, StepOutcome, StepStatus};

/// The ordered steps, shared memory, cursor, and lifecycle flags of one run.
///
/// The step list is fixed at construction. The cursor only moves forward,
/// one step at a time, and `cursor == steps.len()` means the run is
/// complete.
#[derive(Debug, Clone)]
pub struct Pipeline {
  steps: Vec<Step>,
  cursor: usize,
  memory: Memory,
  target_ref: Option<String>,
  is_open: bool,
  streaming: bool,
  halted: Option<usize>,
}

impl Pipeline {
  pub fn new(steps: Vec<Step>, target_ref: Option<String>) -> Self {
    Self {
      steps,
      cursor: 0,
      memory: Memory::default(),
      target_ref,
      is_open: true,
      streaming: false,
      halted: None,
    }
  }

  pub fn from_def(def: &PipelineDef) -> Self {
    Self::new(
      def.steps.iter().map(Step::from).collect(),
      def.target_ref.clone(),
    )
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn step(&self, index: usize) -> Option<&Step> {
    self.steps.get(index)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// The step at the cursor, if the run is not complete.
  pub fn current(&self) -> Option<&Step> {
    self.steps.get(self.cursor)
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn target_ref(&self) -> Option<&str> {
    self.target_ref.as_deref()
  }

  pub fn is_open(&self) -> bool {
    self.is_open
  }

  /// Whether a producer stream is currently being consumed.
  pub fn is_streaming(&self) -> bool {
    self.streaming
  }

  /// Index of the step that halted the run, if any.
  pub fn halted(&self) -> Option<usize> {
    self.halted
  }

  pub fn is_complete(&self) -> bool {
    self.cursor == self.steps.len()
  }

  /// Content of the first step with the given action.
  pub fn preview_of(&self, action: Action) -> Option<&str> {
    self
      .steps
      .iter()
      .find(|s| s.action == action)
      .and_then(|s| s.content_preview.as_deref())
  }

  /// Number of steps currently running.
  pub fn running_count(&self) -> usize {
    self
      .steps
      .iter()
      .filter(|s| s.status == StepStatus::Running)
      .count()
  }

  pub fn snapshot(&self) -> PipelineSnapshot {
    PipelineSnapshot {
      steps: self.steps.clone(),
      cursor: self.cursor,
      memory: self.memory.clone(),
      target_ref: self.target_ref.clone(),
      is_open: self.is_open,
      streaming: self.streaming,
      halted: self.halted,
      complete: self.is_complete(),
    }
  }

  pub(crate) fn set_open(&mut self, open: bool) {
    self.is_open = open;
  }

  pub(crate) fn set_streaming(&mut self, streaming: bool) {
    self.streaming = streaming;
  }

  pub(crate) fn memory_mut(&mut self) -> &mut Memory {
    &mut self.memory
  }

  /// Mark the step at the cursor as running.
  pub(crate) fn start_step(&mut self, index: usize) -> Result<Action, StateError> {
    self.expect_cursor(index)?;
    let step = self.step_mut(index)?;
    step.advance(index, StepStatus::Running)?;
    Ok(step.action)
  }

  /// Mark the running step done and move the cursor past it.
  pub(crate) fn finish_step(
    &mut self,
    index: usize,
    outcome: StepOutcome,
  ) -> Result<(), StateError> {
    self.expect_cursor(index)?;
    let step = self.step_mut(index)?;
    step.advance(index, StepStatus::Done)?;
    step.outcome = Some(outcome);
    self.cursor += 1;
    Ok(())
  }

  /// Mark the running step done as failed and stop the run on it.
  pub(crate) fn halt_step(&mut self, index: usize, error: String) -> Result<(), StateError> {
    self.expect_cursor(index)?;
    let step = self.step_mut(index)?;
    step.advance(index, StepStatus::Done)?;
    step.outcome = Some(StepOutcome::Failed { error });
    self.halted = Some(index);
    Ok(())
  }

  pub(crate) fn append_preview(&mut self, index: usize, fragment: &str) -> Result<(), StateError> {
    self.step_mut(index)?.append_preview(fragment);
    Ok(())
  }

  pub(crate) fn set_preview(&mut self, index: usize, content: String) -> Result<(), StateError> {
    self.step_mut(index)?.content_preview = Some(content);
    Ok(())
  }

  fn step_mut(&mut self, index: usize) -> Result<&mut Step, StateError> {
    let len = self.steps.len();
    self
      .steps
      .get_mut(index)
      .ok_or(StateError::OutOfRange { index, len })
  }

  fn expect_cursor(&self, index: usize) -> Result<(), StateError> {
    if self.cursor != index {
      return Err(StateError::CursorMismatch {
        cursor: self.cursor,
        expected: index,
      });
    }
    Ok(())
  }
}

/// Owned, serializable view of a pipeline for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
  pub steps: Vec<Step>,
  pub cursor: usize,
  pub memory: Memory,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub target_ref: Option<String>,
  pub is_open: bool,
  pub streaming: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub halted: Option<usize>,
  pub complete: bool,
}
