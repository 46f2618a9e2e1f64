//! Pipeline driver.
//!
//! Advances the cursor one step per tick. A tick is a no-op unless the
//! session is mounted, the host is open, the run is neither complete nor
//! halted, the step at the cursor is still pending, and no other tick is
//! processing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::PipelineError;
use crate::executor::StepExecutor;
use crate::session::PipelineSession;
use crate::state::{Pipeline, PipelineSnapshot};
use crate::status::AgentPhase;
use crate::step::StepStatus;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
  /// The step at `index` ran and the cursor moved past it.
  Advanced { index: usize },
  /// The step at the cursor is not pending.
  Idle,
  /// Another tick holds the processing permit.
  Busy,
  /// The host is hidden.
  Closed,
  /// The session was torn down.
  Detached,
  /// Every step is done.
  Complete,
  /// The step at `index` failed under the halt policy.
  Halted { index: usize },
}

/// Result of [`PipelineDriver::run_to_completion`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub execution_id: String,
  /// The tick outcome that ended the loop.
  pub outcome: TickOutcome,
  pub steps_executed: usize,
  pub snapshot: PipelineSnapshot,
}

/// Drives one session with one executor.
#[derive(Clone)]
pub struct PipelineDriver {
  session: PipelineSession,
  executor: Arc<StepExecutor>,
  execution_id: String,
}

impl PipelineDriver {
  pub fn new(session: PipelineSession, executor: Arc<StepExecutor>) -> Self {
    Self {
      session,
      executor,
      execution_id: uuid::Uuid::new_v4().to_string(),
    }
  }

  pub fn session(&self) -> &PipelineSession {
    &self.session
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Run the step at the cursor if every gate allows it.
  ///
  /// Returns `Err(PipelineError::Halted)` when a step fails under the halt
  /// policy. The failure is recorded on the step before returning.
  pub async fn tick(&self) -> Result<TickOutcome, PipelineError> {
    if !self.session.is_mounted() {
      return Ok(TickOutcome::Detached);
    }
    if let Some(outcome) = self.session.read(gate).await {
      return Ok(outcome);
    }

    let Some(_permit) = self.session.guard().try_acquire() else {
      return Ok(TickOutcome::Busy);
    };

    // Another tick may have finished the step between the gate and the permit
    if let Some(outcome) = self.session.read(gate).await {
      return Ok(outcome);
    }

    let index = self.session.read(|p| p.cursor()).await;
    let Some(action) = self.session.try_write(|p| p.start_step(index)).await? else {
      return Ok(TickOutcome::Detached);
    };
    info!(
      execution_id = %self.execution_id,
      index,
      action = %action,
      "step_started"
    );

    let run = match self.executor.run(&self.session, index).await {
      Ok(run) => run,
      Err(source) => {
        let recorded = self
          .session
          .try_write(|p| p.halt_step(index, source.to_string()))
          .await?;
        if recorded.is_none() {
          return Ok(TickOutcome::Detached);
        }
        error!(
          execution_id = %self.execution_id,
          index,
          action = %action,
          error = %source,
          "pipeline_halted"
        );
        self.executor.broadcast(AgentPhase::Halted, source.to_string());
        return Err(PipelineError::Halted { index, source });
      }
    };

    let Some(outcome) = run.into_outcome() else {
      info!(execution_id = %self.execution_id, index, "step_abandoned");
      return Ok(TickOutcome::Detached);
    };

    let cancel = self.session.cancellation();
    if !self.executor.pacing().dwell(action, &cancel).await {
      return Ok(TickOutcome::Detached);
    }

    if self
      .session
      .try_write(|p| p.finish_step(index, outcome))
      .await?
      .is_none()
    {
      return Ok(TickOutcome::Detached);
    }
    info!(
      execution_id = %self.execution_id,
      index,
      action = %action,
      "step_completed"
    );

    Ok(TickOutcome::Advanced { index })
  }

  /// Tick until a tick does not advance.
  ///
  /// A halt ends the loop with [`TickOutcome::Halted`]; the failure is
  /// recorded on the step in the returned snapshot.
  #[instrument(name = "pipeline_run", skip(self), fields(execution_id = %self.execution_id))]
  pub async fn run_to_completion(&self) -> Result<RunSummary, PipelineError> {
    let (steps, empty) = self.session.read(|p| (p.len(), p.is_empty())).await;
    if empty {
      warn!("pipeline_has_no_steps");
    }
    info!(steps, "pipeline_started");

    let mut steps_executed = 0;
    let outcome = loop {
      match self.tick().await {
        Ok(TickOutcome::Advanced { .. }) => steps_executed += 1,
        Ok(outcome) => break outcome,
        Err(PipelineError::Halted { index, .. }) => break TickOutcome::Halted { index },
        Err(e) => return Err(e),
      }
    };

    if outcome == TickOutcome::Complete {
      self
        .executor
        .broadcast(AgentPhase::Complete, "All steps finished");
    }
    info!(outcome = ?outcome, steps_executed, "pipeline_finished");

    Ok(RunSummary {
      execution_id: self.execution_id.clone(),
      outcome,
      steps_executed,
      snapshot: self.session.snapshot().await,
    })
  }
}

/// The outcome of a tick that cannot run a step, or `None` if it can.
fn gate(pipeline: &Pipeline) -> Option<TickOutcome> {
  if let Some(index) = pipeline.halted() {
    return Some(TickOutcome::Halted { index });
  }
  if pipeline.is_complete() {
    return Some(TickOutcome::Complete);
  }
  if !pipeline.is_open() {
    return Some(TickOutcome::Closed);
  }
  match pipeline.current() {
    Some(step) if step.status == StepStatus::Pending => None,
    _ => Some(TickOutcome::Idle),
  }
}
