//! Persistence of the composed report.

use std::time::Duration;

use ledgerflow_artifact::{Artifact, ArtifactSink};
use ledgerflow_config::PersistConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::StepError;
use crate::pacing::sleep_unless_cancelled;

/// Report content used when nothing was composed.
pub const EMPTY_REPORT: &str = "Empty Report";

/// Where an artifact ended up.
#[derive(Debug, Clone)]
pub struct Persisted {
  pub container: String,
  pub artifact: Artifact,
}

/// Builds the report artifact and appends it to the sink.
#[derive(Debug, Clone, Default)]
pub struct PersistenceStep {
  config: PersistConfig,
}

impl PersistenceStep {
  pub fn new(config: PersistConfig) -> Self {
    Self { config }
  }

  pub fn build_artifact(&self, report: &str) -> Artifact {
    Artifact::word_document(&self.config.artifact_name, report, self.config.summary_chars)
  }

  /// Pick the container for the artifact.
  ///
  /// The target if the sink knows it, otherwise the first container the
  /// sink lists.
  pub async fn select_container(
    &self,
    sink: &dyn ArtifactSink,
    target_ref: Option<&str>,
  ) -> Result<String, StepError> {
    let containers = sink.containers().await.map_err(StepError::Containers)?;

    if let Some(target) = target_ref.filter(|t| containers.iter().any(|c| c.as_str() == *t)) {
      return Ok(target.to_string());
    }

    let fallback = containers.into_iter().next().ok_or(StepError::NoContainer)?;
    warn!(
      target_ref = ?target_ref,
      container = %fallback,
      "target container not found, using first available"
    );
    Ok(fallback)
  }

  /// Build and append the artifact, retrying as configured.
  ///
  /// Returns `Ok(None)` if `cancel` fires first. Nothing is appended once
  /// it has fired.
  pub async fn persist(
    &self,
    sink: &dyn ArtifactSink,
    target_ref: Option<&str>,
    report: &str,
    cancel: &CancellationToken,
  ) -> Result<Option<Persisted>, StepError> {
    let container = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Ok(None),
      container = self.select_container(sink, target_ref) => container?,
    };
    let artifact = self.build_artifact(report);
    let backoff = Duration::from_millis(self.config.retry_backoff_ms);

    let mut attempt = 0;
    loop {
      if cancel.is_cancelled() {
        return Ok(None);
      }
      match sink.append(&container, artifact.clone()).await {
        Ok(()) => {
          info!(
            container = %container,
            artifact_id = %artifact.id,
            size = %artifact.size_label,
            "artifact_persisted"
          );
          return Ok(Some(Persisted {
            container,
            artifact,
          }));
        }
        Err(e) if attempt < self.config.retry_attempts => {
          attempt += 1;
          warn!(container = %container, attempt, error = %e, "artifact append failed, retrying");
          if !sleep_unless_cancelled(backoff, cancel).await {
            return Ok(None);
          }
        }
        Err(e) => {
          return Err(StepError::Persist {
            container,
            source: e,
          });
        }
      }
    }
  }
}
