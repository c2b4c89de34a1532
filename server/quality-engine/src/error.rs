//! Structured error types for the quality engine.
//!
//! Metric derivation never fails; these cover dataset parsing, selection and
//! month cloning only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("no data for team {team} in {month}")]
  NoData { month: String, team: String },

  #[error("month {0} already exists")]
  MonthExists(String),

  #[error("dataset has no months")]
  EmptyDataset,

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn no_data(month: impl Into<String>, team: impl Into<String>) -> Self {
    Self::NoData {
      month: month.into(),
      team: team.into(),
    }
  }
}
