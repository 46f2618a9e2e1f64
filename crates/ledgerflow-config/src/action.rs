use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of work a pipeline step performs.
///
/// Upper-case aliases are accepted on input so that step lists exported by
/// the dashboard (`READ_EXCEL`, `WRITE_WORD`, ...) can be loaded directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  #[serde(alias = "NAVIGATE")]
  Navigate,
  #[serde(alias = "READ_EXCEL")]
  FetchData,
  #[serde(alias = "ANALYZE")]
  Analyze,
  #[serde(alias = "WRITE_WORD")]
  Compose,
  #[serde(alias = "SAVE")]
  Persist,
}

impl Action {
  /// Snake case name, matching the serialized form.
  pub fn as_str(self) -> &'static str {
    match self {
      Action::Navigate => "navigate",
      Action::FetchData => "fetch_data",
      Action::Analyze => "analyze",
      Action::Compose => "compose",
      Action::Persist => "persist",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
