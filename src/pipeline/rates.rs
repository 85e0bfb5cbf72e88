//! Monthly rate collection and the persisted rate table (`convert.csv`).

use crate::core::{MonthlyRateProvider, MonthlyRateSet, PipelineError, YearMonth};
use crate::pipeline::csv_io::{self, format_decimal};
use crate::pipeline::partition::CurrencyFrequency;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

pub const DATE_COLUMN: &str = "date";

/// Rates per `YYYY-MM` key for the currencies common enough to publish.
///
/// Built once per run and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    currencies: Vec<String>,
    months: BTreeMap<String, BTreeMap<String, f64>>,
}

impl RateTable {
    pub fn new(currencies: Vec<String>, months: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        RateTable { currencies, months }
    }

    /// Merges fetched months, keeping only currencies that occur more than
    /// `min_count` times in the export. Currencies never seen there count as
    /// zero.
    pub fn from_monthly(
        sets: impl IntoIterator<Item = MonthlyRateSet>,
        frequency: &CurrencyFrequency,
        min_count: u64,
    ) -> Self {
        let sets: Vec<MonthlyRateSet> = sets.into_iter().collect();

        let listed: BTreeSet<&str> = sets
            .iter()
            .flat_map(|set| set.rates.keys().map(String::as_str))
            .collect();
        let currencies: Vec<String> = listed
            .into_iter()
            .filter(|code| frequency.count(code) > min_count)
            .map(str::to_string)
            .collect();
        debug!("Keeping rate columns {:?}", currencies);

        let months = sets
            .into_iter()
            .map(|set| {
                let key = set.key();
                let kept = set
                    .rates
                    .into_iter()
                    .filter(|(code, _)| currencies.contains(code))
                    .collect();
                (key, kept)
            })
            .collect();

        RateTable { currencies, months }
    }

    pub fn rate(&self, year_month: &str, currency: &str) -> Option<f64> {
        self.months
            .get(year_month)
            .and_then(|rates| rates.get(currency))
            .copied()
    }

    /// Retained currency columns, alphabetically.
    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Month keys in ascending order.
    pub fn months(&self) -> impl Iterator<Item = &str> {
        self.months.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Writes one row per month and one column per retained currency; months
    /// without a rate for a currency get a blank cell.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut writer = csv_io::create_writer(path)?;
        writer.write_record(
            std::iter::once(DATE_COLUMN).chain(self.currencies.iter().map(String::as_str)),
        )?;
        for (month, rates) in &self.months {
            let mut row = Vec::with_capacity(self.currencies.len() + 1);
            row.push(month.clone());
            for code in &self.currencies {
                row.push(rates.get(code).map(|r| format_decimal(*r)).unwrap_or_default());
            }
            writer.write_record(&row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            "Wrote {} months x {} currencies to {}",
            self.months.len(),
            self.currencies.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a table previously written by [`RateTable::write_csv`].
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv_io::open_reader(path)?;
        let header = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .clone();
        if header.get(0) != Some(DATE_COLUMN) {
            return Err(PipelineError::Schema {
                column: DATE_COLUMN.to_string(),
                path: path.display().to_string(),
            }
            .into());
        }
        let currencies: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

        let mut months = BTreeMap::new();
        for row in reader.records() {
            let row = row.with_context(|| format!("Failed to read row of {}", path.display()))?;
            let key = row.get(0).unwrap_or_default().to_string();
            let mut rates = BTreeMap::new();
            for (code, cell) in currencies.iter().zip(row.iter().skip(1)) {
                if cell.is_empty() {
                    continue;
                }
                let rate = cell.parse::<f64>().with_context(|| {
                    format!("Invalid {code} rate '{cell}' for {key} in {}", path.display())
                })?;
                rates.insert(code.clone(), rate);
            }
            months.insert(key, rates);
        }
        debug!("Loaded {} months from {}", months.len(), path.display());

        Ok(RateTable { currencies, months })
    }
}

/// Fetches every month in `months`, at most `concurrency` at a time.
///
/// Completion order is arbitrary. The first failure aborts the remaining
/// requests and is returned.
pub async fn fetch_months(
    provider: &dyn MonthlyRateProvider,
    months: Vec<YearMonth>,
    concurrency: usize,
    pb: &ProgressBar,
) -> Result<Vec<MonthlyRateSet>> {
    stream::iter(months)
        .map(|year_month| async move {
            let set = provider.fetch_month(year_month).await?;
            pb.inc(1);
            Ok::<_, anyhow::Error>(set)
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

/// Fetches all twelve months of every year in `window` and builds the
/// filtered rate table.
pub async fn build_rate_table(
    provider: &dyn MonthlyRateProvider,
    window: (i32, i32),
    frequency: &CurrencyFrequency,
    min_count: u64,
    concurrency: usize,
    pb: &ProgressBar,
) -> Result<RateTable> {
    let (first, last) = window;
    let months = YearMonth::range(first, last)?;
    info!(
        "Fetching rates for {} months ({}..={})",
        months.len(),
        first,
        last
    );
    pb.set_length(months.len() as u64);

    let sets = fetch_months(provider, months, concurrency, pb).await?;
    Ok(RateTable::from_monthly(sets, frequency, min_count))
}
