use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read pipeline definition: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse pipeline definition: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("invalid pipeline definition: {message}")]
  Invalid { message: String },
}

impl ConfigError {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Invalid {
      message: message.into(),
    }
  }
}
