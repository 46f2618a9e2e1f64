//! Host-side handle to a running pipeline.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::StateError;
use crate::guard::ReentrancyGuard;
use crate::state::{Pipeline, PipelineSnapshot};

/// Shared handle to one pipeline and its guard.
///
/// Cloning is cheap; all clones see the same state. The session is mounted
/// from [`PipelineSession::attach`] until [`PipelineSession::detach`]. Once
/// detached, every write becomes a no-op and the pipeline should be
/// dropped. A new run needs a new session.
#[derive(Clone)]
pub struct PipelineSession {
  state: Arc<RwLock<Pipeline>>,
  guard: Arc<ReentrancyGuard>,
}

impl PipelineSession {
  pub fn attach(pipeline: Pipeline) -> Self {
    Self {
      state: Arc::new(RwLock::new(pipeline)),
      guard: Arc::new(ReentrancyGuard::new()),
    }
  }

  /// Tear the host down.
  ///
  /// Takes the write lock before flipping the mounted flag, so any write
  /// that started earlier finishes first and none start after.
  pub async fn detach(&self) {
    let _state = self.state.write().await;
    self.guard.detach();
    info!("pipeline_detached");
  }

  pub fn is_mounted(&self) -> bool {
    self.guard.is_mounted()
  }

  /// Show or hide the host. Returns false if already detached.
  pub async fn set_open(&self, open: bool) -> bool {
    self
      .write(|p| p.set_open(open))
      .await
      .is_some()
  }

  pub async fn snapshot(&self) -> PipelineSnapshot {
    self.state.read().await.snapshot()
  }

  pub async fn read<R>(&self, f: impl FnOnce(&Pipeline) -> R) -> R {
    f(&*self.state.read().await)
  }

  pub fn guard(&self) -> &ReentrancyGuard {
    &self.guard
  }

  /// Token cancelled when the session detaches.
  pub fn cancellation(&self) -> CancellationToken {
    self.guard.mounted_token()
  }

  /// Apply a mutation if still mounted. `None` means detached.
  pub(crate) async fn write<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> Option<R> {
    let mut state = self.state.write().await;
    if !self.guard.is_mounted() {
      return None;
    }
    Some(f(&mut state))
  }

  /// Like [`write`](Self::write) for fallible mutations.
  pub(crate) async fn try_write<R>(
    &self,
    f: impl FnOnce(&mut Pipeline) -> Result<R, StateError>,
  ) -> Result<Option<R>, StateError> {
    self.write(f).await.transpose()
  }
}
