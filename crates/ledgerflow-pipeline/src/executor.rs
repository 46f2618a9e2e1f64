//! Step executor.
//!
//! Runs the business logic of exactly one step: pulls content from the
//! producer, mirrors it into the step's preview as it arrives, and writes
//! the finished content into memory.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ledgerflow_artifact::ArtifactSink;
use ledgerflow_config::{Action, ErrorPolicy, PipelineDef};
use ledgerflow_producer::{StreamingTaskProducer, TaskRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{StateError, StepError};
use crate::pacing::{Pacing, sleep_unless_cancelled};
use crate::persist::{EMPTY_REPORT, PersistenceStep};
use crate::session::PipelineSession;
use crate::status::{AgentPhase, NoopBroadcaster, StatusBroadcaster, StatusUpdate};
use crate::step::StepOutcome;

/// Analysis context used when no spreadsheet content was fetched.
pub const NO_DATA_FOUND: &str = "No Data Found";
/// Compose context used when no analysis was produced.
pub const ANALYSIS_INCOMPLETE: &str = "Analysis Incomplete";
/// Marks an error rendered inside step content.
pub const ERROR_MARKER: &str = "[error]";

/// How a step handler returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRun {
  Completed,
  /// The content failed and the error was rendered inline.
  Recovered { error: String },
  /// The session detached mid-step; nothing more was written.
  Abandoned,
}

impl StepRun {
  /// The outcome to record, or `None` if the step was abandoned.
  pub fn into_outcome(self) -> Option<StepOutcome> {
    match self {
      StepRun::Completed => Some(StepOutcome::Completed),
      StepRun::Recovered { error } => Some(StepOutcome::Recovered { error }),
      StepRun::Abandoned => None,
    }
  }
}

/// Why a stream stopped being consumed.
enum StreamEnd {
  Finished,
  Failed(StepError),
  Abandoned,
}

/// Executes individual steps against the producer and sink.
pub struct StepExecutor {
  producer: Arc<dyn StreamingTaskProducer>,
  sink: Arc<dyn ArtifactSink>,
  broadcaster: Arc<dyn StatusBroadcaster>,
  pacing: Pacing,
  policy: ErrorPolicy,
  step_timeout: Option<Duration>,
  persistence: PersistenceStep,
}

impl StepExecutor {
  pub fn new(producer: Arc<dyn StreamingTaskProducer>, sink: Arc<dyn ArtifactSink>) -> Self {
    Self {
      producer,
      sink,
      broadcaster: Arc::new(NoopBroadcaster),
      pacing: Pacing::default(),
      policy: ErrorPolicy::default(),
      step_timeout: None,
      persistence: PersistenceStep::default(),
    }
  }

  /// Create an executor configured from a pipeline definition.
  pub fn from_def(
    def: &PipelineDef,
    producer: Arc<dyn StreamingTaskProducer>,
    sink: Arc<dyn ArtifactSink>,
  ) -> Self {
    Self::new(producer, sink)
      .with_pacing(Pacing::new(def.pacing.clone()))
      .with_policy(def.on_error)
      .with_step_timeout(def.step_timeout_ms.map(Duration::from_millis))
      .with_persistence(PersistenceStep::new(def.persist.clone()))
  }

  pub fn with_broadcaster(mut self, broadcaster: Arc<dyn StatusBroadcaster>) -> Self {
    self.broadcaster = broadcaster;
    self
  }

  pub fn with_pacing(mut self, pacing: Pacing) -> Self {
    self.pacing = pacing;
    self
  }

  pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.step_timeout = timeout;
    self
  }

  pub fn with_persistence(mut self, persistence: PersistenceStep) -> Self {
    self.persistence = persistence;
    self
  }

  pub fn pacing(&self) -> &Pacing {
    &self.pacing
  }

  pub(crate) fn broadcast(&self, phase: AgentPhase, detail: impl Into<String>) {
    self.broadcaster.update(StatusUpdate::new(phase, detail));
  }

  /// Run the step at `index`.
  ///
  /// Under [`ErrorPolicy::Inline`] every step failure is rendered into the
  /// step's preview and comes back as [`StepRun::Recovered`]. Under
  /// [`ErrorPolicy::Halt`] it is returned.
  #[instrument(name = "step_execute", skip(self, session))]
  pub async fn run(&self, session: &PipelineSession, index: usize) -> Result<StepRun, StepError> {
    let (action, description, target_ref) = session
      .read(|p| {
        p.step(index)
          .map(|s| {
            (
              s.action,
              s.description.clone(),
              p.target_ref().map(str::to_string),
            )
          })
          .ok_or(StateError::OutOfRange {
            index,
            len: p.len(),
          })
      })
      .await?;

    self.broadcast(AgentPhase::for_action(action), description);

    let result = match action {
      // Pointer moves are pacing only
      Action::Navigate => Ok(StepRun::Completed),
      Action::FetchData => {
        let request = TaskRequest::new(action, target_ref, "");
        self.run_stream(session, index, request).await
      }
      Action::Analyze => {
        let context = session
          .read(|p| p.memory().excel_data().unwrap_or(NO_DATA_FOUND).to_string())
          .await;
        let request = TaskRequest::new(action, target_ref, context);
        self.run_stream(session, index, request).await
      }
      Action::Compose => {
        let context = session
          .read(|p| p.memory().analysis().unwrap_or(ANALYSIS_INCOMPLETE).to_string())
          .await;
        let request = TaskRequest::new(action, target_ref, context);
        self.run_stream(session, index, request).await
      }
      Action::Persist => self.run_persist(session, index, target_ref).await,
    };

    match result {
      Err(error) if self.policy == ErrorPolicy::Inline => self.recover(session, index, error).await,
      other => other,
    }
  }

  /// Render a failure into the step preview.
  async fn recover(
    &self,
    session: &PipelineSession,
    index: usize,
    error: StepError,
  ) -> Result<StepRun, StepError> {
    let fragment = error_fragment(&error);
    let written = session
      .write(|p| {
        p.set_streaming(false);
        p.append_preview(index, &fragment)
      })
      .await;
    match written {
      None => return Ok(StepRun::Abandoned),
      Some(Err(state)) => return Err(state.into()),
      Some(Ok(())) => {}
    }
    warn!(index, error = %error, "step_recovered");
    Ok(StepRun::Recovered {
      error: error.to_string(),
    })
  }

  /// Stream content for a step and record it.
  async fn run_stream(
    &self,
    session: &PipelineSession,
    index: usize,
    request: TaskRequest,
  ) -> Result<StepRun, StepError> {
    let action = request.action;
    let cancel = session.cancellation();

    if session.write(|p| p.set_streaming(true)).await.is_none() {
      return Ok(StepRun::Abandoned);
    }

    let mut content = String::new();
    let end = match self.step_timeout {
      Some(limit) => {
        match tokio::time::timeout(limit, self.consume(session, index, request, &cancel, &mut content))
          .await
        {
          Ok(end) => end?,
          Err(_) => StreamEnd::Failed(StepError::Timeout {
            action,
            timeout_ms: limit.as_millis() as u64,
          }),
        }
      }
      None => self.consume(session, index, request, &cancel, &mut content).await?,
    };

    let error = match end {
      StreamEnd::Abandoned => return Ok(StepRun::Abandoned),
      StreamEnd::Finished => None,
      StreamEnd::Failed(error) => {
        if self.policy == ErrorPolicy::Halt {
          session.write(|p| p.set_streaming(false)).await;
          return Err(error);
        }
        let fragment = error_fragment(&error);
        content.push_str(&fragment);
        if session
          .try_write(|p| p.append_preview(index, &fragment))
          .await?
          .is_none()
        {
          return Ok(StepRun::Abandoned);
        }
        Some(error)
      }
    };

    let recorded = session
      .try_write(|p| {
        p.set_streaming(false);
        match action {
          Action::FetchData => p.memory_mut().record_excel_data(content),
          Action::Analyze => p.memory_mut().record_analysis(content),
          // Composed content lives on the step itself
          _ => Ok(()),
        }
      })
      .await?;
    if recorded.is_none() {
      return Ok(StepRun::Abandoned);
    }

    Ok(match error {
      None => StepRun::Completed,
      Some(error) => {
        warn!(index, action = %action, error = %error, "step_recovered");
        StepRun::Recovered {
          error: error.to_string(),
        }
      }
    })
  }

  /// Pull fragments until the stream ends, fails, or the session detaches.
  async fn consume(
    &self,
    session: &PipelineSession,
    index: usize,
    request: TaskRequest,
    cancel: &CancellationToken,
    content: &mut String,
  ) -> Result<StreamEnd, StateError> {
    let action = request.action;
    let throttle = self.pacing.chunk_delay(action);

    let started = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Ok(StreamEnd::Abandoned),
      started = self.producer.stream(request, cancel.child_token()) => started,
    };
    let mut stream = match started {
      Ok(stream) => stream,
      Err(source) => return Ok(StreamEnd::Failed(StepError::Producer { action, source })),
    };

    loop {
      let next = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(StreamEnd::Abandoned),
        next = stream.next() => next,
      };

      match next {
        None => return Ok(StreamEnd::Finished),
        Some(Err(source)) => return Ok(StreamEnd::Failed(StepError::Producer { action, source })),
        Some(Ok(fragment)) => {
          debug!(index, len = fragment.len(), "fragment_received");
          content.push_str(&fragment);
          if session
            .try_write(|p| p.append_preview(index, &fragment))
            .await?
            .is_none()
          {
            return Ok(StreamEnd::Abandoned);
          }
          if !sleep_unless_cancelled(throttle, cancel).await {
            return Ok(StreamEnd::Abandoned);
          }
        }
      }
    }
  }

  /// Save the composed report.
  async fn run_persist(
    &self,
    session: &PipelineSession,
    index: usize,
    target_ref: Option<String>,
  ) -> Result<StepRun, StepError> {
    let report = session
      .read(|p| {
        p.preview_of(Action::Compose)
          .filter(|s| !s.is_empty())
          .unwrap_or(EMPTY_REPORT)
          .to_string()
      })
      .await;
    let cancel = session.cancellation();

    let Some(persisted) = self
      .persistence
      .persist(self.sink.as_ref(), target_ref.as_deref(), &report, &cancel)
      .await?
    else {
      return Ok(StepRun::Abandoned);
    };

    let detail = format!(
      "Saved {} ({}) to {}",
      persisted.artifact.name, persisted.artifact.size_label, persisted.container
    );
    if session
      .try_write(|p| p.set_preview(index, detail.clone()))
      .await?
      .is_none()
    {
      return Ok(StepRun::Abandoned);
    }
    info!(index, container = %persisted.container, "report_saved");
    self.broadcast(AgentPhase::Saved, detail);
    Ok(StepRun::Completed)
  }
}

/// Render an error as a content fragment.
pub fn error_fragment(error: &StepError) -> String {
  format!("\n\n{} {}", ERROR_MARKER, error)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ledgerflow_producer::ProducerError;

  #[test]
  fn test_error_fragment_carries_marker() {
    let error = StepError::Producer {
      action: Action::Analyze,
      source: ProducerError::stream("model overloaded"),
    };
    let fragment = error_fragment(&error);
    assert!(fragment.contains(ERROR_MARKER));
    assert!(fragment.contains("model overloaded"));
  }

  #[test]
  fn test_abandoned_run_has_no_outcome() {
    assert_eq!(StepRun::Abandoned.into_outcome(), None);
    assert_eq!(
      StepRun::Completed.into_outcome(),
      Some(StepOutcome::Completed)
    );
  }
}
