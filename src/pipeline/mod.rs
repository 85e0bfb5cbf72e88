//! The normalization pipeline: partition the export by year, build the rate
//! table, rewrite every partition with ruble salaries.

pub mod batch;
pub mod csv_io;
pub mod partition;
pub mod rates;
pub mod salary;

pub use batch::{YearReport, normalize_partitions};
pub use partition::{CurrencyFrequency, Partitioned, VacancyRecord, parse_source};
pub use rates::{RateTable, build_rate_table};
pub use salary::{NormalizedSalary, Salary};
