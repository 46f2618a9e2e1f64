//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ledgerflow_artifact::ArtifactSink;
use ledgerflow_config::{Action, ErrorPolicy, PipelineDef, StepDef};
use ledgerflow_pipeline::{
  Pacing, Pipeline, PipelineDriver, PipelineSession, StatusBroadcaster, StepExecutor,
};
use ledgerflow_producer::{FragmentStream, ProducerError, StreamingTaskProducer, TaskRequest};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

pub type Feed = mpsc::UnboundedSender<Result<String, ProducerError>>;

/// Producer whose stream for one action is fed by the test.
///
/// Fragments sent on the returned [`Feed`] are yielded in order; dropping
/// the feed ends the stream. Every other action yields a single fragment
/// named after the action.
pub struct GatedProducer {
  gated: Action,
  receiver: Mutex<Option<mpsc::UnboundedReceiver<Result<String, ProducerError>>>>,
  gated_calls: AtomicUsize,
  requests: Mutex<Vec<TaskRequest>>,
}

impl GatedProducer {
  pub fn new(gated: Action) -> (Arc<Self>, Feed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let producer = Self {
      gated,
      receiver: Mutex::new(Some(rx)),
      gated_calls: AtomicUsize::new(0),
      requests: Mutex::new(Vec::new()),
    };
    (Arc::new(producer), tx)
  }

  pub fn gated_calls(&self) -> usize {
    self.gated_calls.load(Ordering::SeqCst)
  }

  pub async fn requests(&self) -> Vec<TaskRequest> {
    self.requests.lock().await.clone()
  }
}

#[async_trait]
impl StreamingTaskProducer for GatedProducer {
  async fn stream(
    &self,
    request: TaskRequest,
    _cancel: CancellationToken,
  ) -> Result<FragmentStream, ProducerError> {
    let action = request.action;
    self.requests.lock().await.push(request);

    if action != self.gated {
      let fragment = format!("{} output", action);
      return Ok(Box::pin(futures::stream::iter(vec![Ok(fragment)])));
    }

    self.gated_calls.fetch_add(1, Ordering::SeqCst);
    let rx = self
      .receiver
      .lock()
      .await
      .take()
      .ok_or_else(|| ProducerError::unavailable("gated stream already taken"))?;

    let stream = futures::stream::unfold(rx, |mut rx| async move {
      rx.recv().await.map(|item| (item, rx))
    });
    Ok(Box::pin(stream))
  }
}

/// Builds a session and driver with pacing off.
pub struct Harness {
  def: PipelineDef,
  producer: Arc<dyn StreamingTaskProducer>,
  sink: Arc<dyn ArtifactSink>,
  broadcaster: Option<Arc<dyn StatusBroadcaster>>,
  step_timeout: Option<Duration>,
}

impl Harness {
  pub fn new(
    def: PipelineDef,
    producer: Arc<dyn StreamingTaskProducer>,
    sink: Arc<dyn ArtifactSink>,
  ) -> Self {
    Self {
      def,
      producer,
      sink,
      broadcaster: None,
      step_timeout: None,
    }
  }

  pub fn policy(mut self, policy: ErrorPolicy) -> Self {
    self.def.on_error = policy;
    self
  }

  pub fn broadcaster(mut self, broadcaster: Arc<dyn StatusBroadcaster>) -> Self {
    self.broadcaster = Some(broadcaster);
    self
  }

  pub fn step_timeout(mut self, timeout: Duration) -> Self {
    self.step_timeout = Some(timeout);
    self
  }

  pub fn build(self) -> (PipelineSession, PipelineDriver) {
    let mut executor = StepExecutor::from_def(&self.def, self.producer, self.sink)
      .with_pacing(Pacing::disabled());
    if let Some(broadcaster) = self.broadcaster {
      executor = executor.with_broadcaster(broadcaster);
    }
    if self.step_timeout.is_some() {
      executor = executor.with_step_timeout(self.step_timeout);
    }

    let session = PipelineSession::attach(Pipeline::from_def(&self.def));
    let driver = PipelineDriver::new(session.clone(), Arc::new(executor));
    (session, driver)
  }
}

/// The five step audit report against `target`.
pub fn audit_def(target: &str) -> PipelineDef {
  PipelineDef::audit_report(Some(target.to_string()))
}

/// A pipeline with just the given actions.
pub fn def_with(actions: &[Action], target: &str) -> PipelineDef {
  let mut def = audit_def(target);
  def.steps = actions
    .iter()
    .map(|a| StepDef::new(*a, format!("{} step", a)))
    .collect();
  def
}

/// Poll the pipeline until `check` holds, failing after two seconds.
pub async fn wait_until(session: &PipelineSession, check: impl Fn(&Pipeline) -> bool) {
  let polled = tokio::time::timeout(Duration::from_secs(2), async {
    loop {
      if session.read(|p| check(p)).await {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
  .await;
  assert!(polled.is_ok(), "condition not reached within two seconds");
}
