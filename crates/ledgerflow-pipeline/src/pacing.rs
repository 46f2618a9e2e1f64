//! Cosmetic pacing.
//!
//! Dwell delays and per-fragment throttling exist so a viewer can follow
//! the agent. They live here, outside step logic, and can be switched off
//! without changing what the pipeline produces.

use std::time::Duration;

use ledgerflow_config::{Action, PacingConfig};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct Pacing {
  config: PacingConfig,
}

impl Pacing {
  pub fn new(config: PacingConfig) -> Self {
    Self { config }
  }

  pub fn disabled() -> Self {
    Self::new(PacingConfig::disabled())
  }

  /// Delay after each streamed fragment of `action`.
  pub fn chunk_delay(&self, action: Action) -> Duration {
    Duration::from_millis(self.config.chunk_delay_ms(action))
  }

  /// Wait out the dwell for `action`. Returns false if cancelled first.
  pub async fn dwell(&self, action: Action, cancel: &CancellationToken) -> bool {
    for ms in self.config.dwell_ms(action) {
      if !sleep_unless_cancelled(Duration::from_millis(ms), cancel).await {
        return false;
      }
    }
    !cancel.is_cancelled()
  }
}

/// Sleep for `duration` unless `cancel` fires. Returns false if cancelled.
pub(crate) async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
  if duration.is_zero() {
    return !cancel.is_cancelled();
  }
  tokio::select! {
    _ = cancel.cancelled() => false,
    _ = tokio::time::sleep(duration) => true,
  }
}
