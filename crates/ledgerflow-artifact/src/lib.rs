//! Ledgerflow Artifact
//!
//! This crate provides the artifact record produced at the end of a pipeline
//! and the sink trait that stores it.
//!
//! An [`Artifact`] is a finished document (the drafted memo) with its
//! payload base64 encoded. The [`ArtifactSink`] trait is the boundary to the
//! document collection that keeps it. Containers are the documents an
//! artifact can be attached to.
//!
//! Two implementations ship with the crate:
//! - [`InMemorySink`] keeps everything in process, for tests and previews
//! - [`FsSink`] writes one JSON file per artifact under a base directory

mod fs;
mod memory;
mod record;

pub use fs::FsSink;
pub use memory::InMemorySink;
pub use record::{Artifact, WORD_MIME_TYPE, size_label};

use async_trait::async_trait;

/// Error type for artifact sink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested container was not found.
  #[error("container not found: {0}")]
  NotFound(String),

  /// The container reference is not a plain name.
  #[error("invalid container reference: '{0}'")]
  InvalidContainer(String),

  /// The sink refused the artifact.
  #[error("artifact rejected: {message}")]
  Rejected { message: String },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The artifact could not be encoded or decoded.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// The payload is not valid base64 or UTF-8.
  #[error("invalid payload: {message}")]
  InvalidPayload { message: String },
}

/// Durable collection that finished artifacts are appended to.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
  /// Identifiers of the containers artifacts can be attached to, in order.
  async fn containers(&self) -> Result<Vec<String>, Error>;

  /// Append an artifact to a container.
  async fn append(&self, container_ref: &str, artifact: Artifact) -> Result<(), Error>;

  /// Artifacts stored in a container, oldest first.
  async fn list(&self, container_ref: &str) -> Result<Vec<Artifact>, Error>;
}
