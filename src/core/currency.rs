//! Exchange rate abstractions

use crate::core::error::PipelineError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Display;

/// A calendar month addressed by the rate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(PipelineError::fetch(
                format!("{year:04}-{month:02}"),
                "not a valid calendar month",
            )
            .into());
        }
        Ok(YearMonth { year, month })
    }

    /// All twelve months of every year in `first..=last`, in calendar order.
    pub fn range(first: i32, last: i32) -> Result<Vec<YearMonth>> {
        let mut months = Vec::new();
        for year in first..=last {
            for month in 1..=12 {
                months.push(YearMonth::new(year, month)?);
            }
        }
        Ok(months)
    }

    /// First day of the month, formatted `DD/MM/YYYY` as the rate source expects.
    pub fn request_date(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| format!("01/{:02}/{:04}", self.month, self.year))
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Ruble-per-unit rates for every currency listed in one month.
///
/// The base currency is never listed; callers treat it as 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRateSet {
    pub year_month: YearMonth,
    pub rates: BTreeMap<String, f64>,
}

impl MonthlyRateSet {
    pub fn new(year_month: YearMonth) -> Self {
        MonthlyRateSet {
            year_month,
            rates: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> String {
        self.year_month.to_string()
    }
}

#[async_trait]
pub trait MonthlyRateProvider: Send + Sync {
    async fn fetch_month(&self, year_month: YearMonth) -> Result<MonthlyRateSet>;
}
