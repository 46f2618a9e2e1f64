use ledgerflow_config::Action;
use thiserror::Error;

/// Errors raised by a content producer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProducerError {
  /// The producer could not start a stream.
  #[error("producer unavailable: {message}")]
  Unavailable { message: String },

  /// The stream broke after it started.
  #[error("stream interrupted: {message}")]
  Stream { message: String },

  /// The producer has nothing to generate for this action.
  #[error("action '{action}' does not produce content")]
  Unsupported { action: Action },
}

impl ProducerError {
  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::Unavailable {
      message: message.into(),
    }
  }

  pub fn stream(message: impl Into<String>) -> Self {
    Self::Stream {
      message: message.into(),
    }
  }
}
