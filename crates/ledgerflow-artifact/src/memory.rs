use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Artifact, ArtifactSink, Error};

/// In-process artifact sink.
///
/// Containers are kept in insertion order, which is the order
/// [`ArtifactSink::containers`] reports them in.
#[derive(Default)]
pub struct InMemorySink {
  inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
  documents: Vec<(String, Vec<Artifact>)>,
  appends: usize,
  reject_remaining: u32,
}

impl InMemorySink {
  /// Create a sink with the given containers.
  pub fn new<I, S>(containers: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let documents = containers
      .into_iter()
      .map(|c| (c.into(), Vec::new()))
      .collect();
    Self {
      inner: RwLock::new(Inner {
        documents,
        ..Inner::default()
      }),
    }
  }

  /// Reject the next `count` appends.
  pub fn rejecting(self, count: u32) -> Self {
    let mut inner = self.inner.into_inner();
    inner.reject_remaining = count;
    Self {
      inner: RwLock::new(inner),
    }
  }

  /// Number of append calls received, including rejected ones.
  pub async fn append_calls(&self) -> usize {
    self.inner.read().await.appends
  }
}

#[async_trait]
impl ArtifactSink for InMemorySink {
  async fn containers(&self) -> Result<Vec<String>, Error> {
    let inner = self.inner.read().await;
    Ok(inner.documents.iter().map(|(id, _)| id.clone()).collect())
  }

  async fn append(&self, container_ref: &str, artifact: Artifact) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner.appends += 1;

    if inner.reject_remaining > 0 {
      inner.reject_remaining -= 1;
      return Err(Error::Rejected {
        message: "sink temporarily unavailable".to_string(),
      });
    }

    let (_, artifacts) = inner
      .documents
      .iter_mut()
      .find(|(id, _)| id == container_ref)
      .ok_or_else(|| Error::NotFound(container_ref.to_string()))?;
    artifacts.push(artifact);
    Ok(())
  }

  async fn list(&self, container_ref: &str) -> Result<Vec<Artifact>, Error> {
    let inner = self.inner.read().await;
    inner
      .documents
      .iter()
      .find(|(id, _)| id == container_ref)
      .map(|(_, artifacts)| artifacts.clone())
      .ok_or_else(|| Error::NotFound(container_ref.to_string()))
  }
}
