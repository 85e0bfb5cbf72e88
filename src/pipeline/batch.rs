//! Rewrites year partitions with a single ruble salary column.

use crate::core::PipelineError;
use crate::pipeline::csv_io;
use crate::pipeline::partition::VacancyRecord;
use crate::pipeline::rates::RateTable;
use crate::pipeline::salary::Salary;
use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const SALARY_COLUMN: &str = "salary";

// Positions in the export layout
const SALARY_FROM: usize = 1;
const SALARY_TO: usize = 2;
const SALARY_CURRENCY: usize = 3;
const MIN_FIELDS: usize = 4;

/// Row counts for one normalized partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearReport {
    pub year: String,
    pub rows: u64,
    pub converted: u64,
    pub empty: u64,
    pub malformed: u64,
}

/// The last two fields of a row (location and date in the export layout).
fn trailing_pair(fields: &[&str]) -> (String, String) {
    match fields {
        [.., a, b] => (a.to_string(), b.to_string()),
        [b] => (String::new(), b.to_string()),
        [] => (String::new(), String::new()),
    }
}

/// Partition name of a `*.csv` file, `None` for anything else. Dot-leading
/// names such as `.csv` count.
fn partition_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.strip_suffix(".csv")
}

/// Normalizes one partition file into `output`.
///
/// Rows whose salary cannot be read, or that are too short to carry one,
/// keep their place in the output with a blank salary and are counted as
/// malformed.
pub fn normalize_file(
    input: &Path,
    output: &Path,
    rates: &RateTable,
    base_currency: &str,
) -> Result<YearReport> {
    let mut reader = csv_io::open_reader(input)?;
    let header = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", input.display()))?
        .clone();
    if header.len() < MIN_FIELDS {
        bail!(
            "Expected at least {} columns in {}, found {}",
            MIN_FIELDS,
            input.display(),
            header.len()
        );
    }

    let header_fields: Vec<&str> = header.iter().collect();
    let (location, date) = trailing_pair(&header_fields);

    let mut writer = csv_io::create_writer(output)?;
    writer.write_record([header_fields[0], SALARY_COLUMN, location.as_str(), date.as_str()])?;

    let mut report = YearReport {
        year: partition_name(input).unwrap_or_default().to_string(),
        ..Default::default()
    };

    for row in reader.records() {
        let row = row.with_context(|| format!("Failed to read row of {}", input.display()))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let record = VacancyRecord::new(row);
        report.rows += 1;

        let salary = if record.len() < MIN_FIELDS {
            Err(format!("expected at least {MIN_FIELDS} fields, found {}", record.len()))
        } else {
            Salary::new(
                record.field(SALARY_FROM),
                record.field(SALARY_TO),
                record.field(SALARY_CURRENCY),
            )
            .to_base(record.year_month(), rates, base_currency)
            .map_err(|e| e.to_string())
        };

        let cell = match salary {
            Ok(Some(value)) => {
                report.converted += 1;
                value.to_string()
            }
            Ok(None) => {
                report.empty += 1;
                String::new()
            }
            Err(reason) => {
                let err = PipelineError::MalformedRow {
                    line,
                    path: input.display().to_string(),
                    reason,
                };
                warn!("{}", err);
                report.malformed += 1;
                String::new()
            }
        };

        let fields: Vec<&str> = record.as_record().iter().collect();
        // Short rows only keep their name and, when distinct from it, the date
        let (location, date) = if record.len() >= MIN_FIELDS {
            trailing_pair(&fields)
        } else if record.len() > 1 {
            (String::new(), record.date().to_string())
        } else {
            (String::new(), String::new())
        };
        writer.write_record([record.field(0), cell.as_str(), location.as_str(), date.as_str()])?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output.display()))?;
    debug!(?report, "Normalized {}", input.display());
    Ok(report)
}

/// Lists the `*.csv` files of a partition directory, sorted by name.
pub fn list_partitions(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && partition_name(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Normalizes every partition in `inputs` into `output_dir`, at most
/// `workers` files at a time. Each worker reads the shared rate table and
/// owns its own input and output files.
pub async fn normalize_partitions(
    inputs: Vec<PathBuf>,
    output_dir: &Path,
    rates: Arc<RateTable>,
    base_currency: &str,
    workers: usize,
    pb: &ProgressBar,
) -> Result<Vec<YearReport>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;
    info!(
        "Normalizing {} partitions with {} workers",
        inputs.len(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for input in inputs {
        let Some(file_name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(file_name);
        let rates = Arc::clone(&rates);
        let base_currency = base_currency.to_string();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            tokio::task::spawn_blocking(move || {
                normalize_file(&input, &output, &rates, &base_currency)
            })
            .await?
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let report = joined??;
        pb.inc(1);
        reports.push(report);
    }
    reports.sort_by(|a, b| a.year.cmp(&b.year));
    Ok(reports)
}
