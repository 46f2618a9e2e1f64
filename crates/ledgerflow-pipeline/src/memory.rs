//! Typed memory shared between steps.
//!
//! Each slot has exactly one writer action and is written at most once per
//! run. Readers get `Option`s and substitute their own fallback.

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Display key of the fetched spreadsheet content.
pub const EXCEL_DATA_KEY: &str = "excelData";
/// Display key of the analysis text.
pub const ANALYSIS_KEY: &str = "analysis";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
  /// Written by fetch_data, read by analyze.
  #[serde(rename = "excelData", skip_serializing_if = "Option::is_none")]
  excel_data: Option<String>,
  /// Written by analyze, read by compose.
  #[serde(skip_serializing_if = "Option::is_none")]
  analysis: Option<String>,
}

impl Memory {
  pub fn excel_data(&self) -> Option<&str> {
    self.excel_data.as_deref()
  }

  pub fn analysis(&self) -> Option<&str> {
    self.analysis.as_deref()
  }

  pub fn is_empty(&self) -> bool {
    self.excel_data.is_none() && self.analysis.is_none()
  }

  pub(crate) fn record_excel_data(&mut self, value: String) -> Result<(), StateError> {
    write_once(&mut self.excel_data, EXCEL_DATA_KEY, value)
  }

  pub(crate) fn record_analysis(&mut self, value: String) -> Result<(), StateError> {
    write_once(&mut self.analysis, ANALYSIS_KEY, value)
  }
}

fn write_once(
  slot: &mut Option<String>,
  name: &'static str,
  value: String,
) -> Result<(), StateError> {
  if slot.is_some() {
    return Err(StateError::SlotAlreadyWritten { slot: name });
  }
  *slot = Some(value);
  Ok(())
}
