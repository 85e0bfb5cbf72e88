//! Error taxonomy shared by the pipeline phases.
//!
//! Orchestration code works with `anyhow::Result`; these variants are what
//! callers can `downcast_ref` to when they need to tell failures apart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source header does not carry a required column. Aborts partitioning.
    #[error("Missing required column '{column}' in header of {path}")]
    Schema { column: String, path: String },

    /// The rate source could not be reached or returned unusable content.
    /// Aborts the fetch phase and with it the whole run.
    #[error("Failed to fetch rates for {year_month}: {reason}")]
    Fetch { year_month: String, reason: String },

    /// A data row that cannot be normalized. Reported, never fatal.
    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow {
        line: u64,
        path: String,
        reason: String,
    },
}

impl PipelineError {
    pub fn fetch(year_month: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Fetch {
            year_month: year_month.into(),
            reason: reason.to_string(),
        }
    }
}
