use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{Artifact, ArtifactSink, Error};

/// Filesystem-based artifact sink.
///
/// Each container is a directory under `base_path`, and each artifact is
/// stored at `{base_path}/{container}/{artifact_id}.json`.
pub struct FsSink {
  base_path: PathBuf,
}

impl FsSink {
  /// Create a new filesystem sink with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Make sure a container directory exists.
  pub async fn create_container(&self, container_ref: &str) -> Result<(), Error> {
    fs::create_dir_all(self.container_path(container_ref)?).await?;
    Ok(())
  }

  /// Directory of a container. The reference must be a single path
  /// component so it cannot leave `base_path`.
  fn container_path(&self, container_ref: &str) -> Result<PathBuf, Error> {
    let mut components = Path::new(container_ref).components();
    match (components.next(), components.next()) {
      (Some(Component::Normal(name)), None) if name == container_ref => {
        Ok(self.base_path.join(name))
      }
      _ => Err(Error::InvalidContainer(container_ref.to_string())),
    }
  }

  async fn existing_container(&self, container_ref: &str) -> Result<PathBuf, Error> {
    let path = self.container_path(container_ref)?;
    match fs::metadata(&path).await {
      Ok(meta) if meta.is_dir() => Ok(path),
      Ok(_) => Err(Error::NotFound(container_ref.to_string())),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(Error::NotFound(container_ref.to_string()))
      }
      Err(e) => Err(Error::Io(e)),
    }
  }
}

#[async_trait]
impl ArtifactSink for FsSink {
  async fn containers(&self) -> Result<Vec<String>, Error> {
    let mut entries = match fs::read_dir(&self.base_path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io(e)),
    };

    let mut containers = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      if entry.file_type().await?.is_dir() {
        containers.push(entry.file_name().to_string_lossy().into_owned());
      }
    }
    containers.sort();
    Ok(containers)
  }

  async fn append(&self, container_ref: &str, artifact: Artifact) -> Result<(), Error> {
    let dir = self.existing_container(container_ref).await?;
    let path = dir.join(format!("{}.json", artifact.id));
    let data = serde_json::to_vec_pretty(&artifact)?;

    let mut file = fs::File::create(path).await?;
    file.write_all(&data).await?;
    file.flush().await?;
    Ok(())
  }

  async fn list(&self, container_ref: &str) -> Result<Vec<Artifact>, Error> {
    let dir = self.existing_container(container_ref).await?;
    let mut entries = fs::read_dir(&dir).await?;

    let mut artifacts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        let data = fs::read(&path).await?;
        artifacts.push(serde_json::from_slice::<Artifact>(&data)?);
      }
    }
    artifacts.sort_by_key(|a| a.created_at);
    Ok(artifacts)
  }
}
