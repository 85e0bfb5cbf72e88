//! Core abstractions: configuration, errors, logging and the rate provider seam

pub mod config;
pub mod currency;
pub mod error;
pub mod log;

// Re-export main types for cleaner imports
pub use currency::{MonthlyRateProvider, MonthlyRateSet, YearMonth};
pub use error::PipelineError;
