//! Ledgerflow Producer
//!
//! This crate defines the boundary between the pipeline and whatever
//! generates step content (in production, a language model call).
//!
//! The [`StreamingTaskProducer`] trait takes a [`TaskRequest`] and returns a
//! [`FragmentStream`]. Consumers may stop pulling at any time; the
//! cancellation token passed alongside the request tells the producer that
//! nobody is listening anymore.
//!
//! [`ScriptedProducer`] replays canned fragments and is used by the CLI and
//! by tests.

mod error;
mod scripted;

pub use error::ProducerError;
pub use scripted::{ActionScript, Script, ScriptedProducer};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use ledgerflow_config::Action;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A boxed stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProducerError>> + Send>>;

/// What a step asks the producer to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
  pub action: Action,
  /// Subject document the pipeline operates on.
  pub subject_ref: Option<String>,
  /// Upstream content the step builds on. Empty for the first content step.
  pub context: String,
}

impl TaskRequest {
  pub fn new(action: Action, subject_ref: Option<String>, context: impl Into<String>) -> Self {
    Self {
      action,
      subject_ref,
      context: context.into(),
    }
  }
}

/// Streaming source of step content.
#[async_trait]
pub trait StreamingTaskProducer: Send + Sync {
  /// Start producing content for a request.
  ///
  /// Errors returned here mean the stream never started. Errors yielded by
  /// the stream mean it broke part way through.
  async fn stream(
    &self,
    request: TaskRequest,
    cancel: CancellationToken,
  ) -> Result<FragmentStream, ProducerError>;
}
