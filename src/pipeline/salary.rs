//! Conversion of a vacancy's salary fork into a single ruble figure.

use crate::pipeline::csv_io::format_decimal;
use crate::pipeline::rates::RateTable;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid salary amount '{0}'")]
pub struct InvalidAmount(pub String);

/// A converted salary.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedSalary {
    /// Base-currency bound passed through as written in the export.
    Raw(String),
    /// Floored product of a single bound and its rate.
    Whole(i64),
    /// Midpoint of both bounds scaled by the rate.
    Scaled(f64),
}

impl Display for NormalizedSalary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizedSalary::Raw(raw) => write!(f, "{raw}"),
            NormalizedSalary::Whole(value) => write!(f, "{value}"),
            NormalizedSalary::Scaled(value) => write!(f, "{}", format_decimal(*value)),
        }
    }
}

/// The salary fork of one vacancy, borrowed from its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salary<'a> {
    from: Option<&'a str>,
    to: Option<&'a str>,
    currency: &'a str,
}

fn non_empty(field: &str) -> Option<&str> {
    (!field.is_empty()).then_some(field)
}

fn parse_bound(raw: &str) -> Result<f64, InvalidAmount> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InvalidAmount(raw.to_string()))
}

/// `floor(value)` as an integer, `None` when it does not fit in an `i64`.
fn floor_to_i64(value: f64) -> Option<i64> {
    let floored = value.floor();
    // 2^63 is exactly representable, i64::MAX is not
    let limit = 9_223_372_036_854_775_808.0_f64;
    (floored >= -limit && floored < limit).then_some(floored as i64)
}

impl<'a> Salary<'a> {
    pub fn new(from: &'a str, to: &'a str, currency: &'a str) -> Self {
        Salary {
            from: non_empty(from),
            to: non_empty(to),
            currency,
        }
    }

    /// Converts the salary into the base currency using the rate published
    /// for `year_month`.
    ///
    /// Returns `Ok(None)` when the currency is missing, when a foreign
    /// currency has no rate for that month, or when neither bound is given.
    /// A single bound is multiplied by the rate and floored (base-currency
    /// bounds are returned verbatim). With both bounds the sum is floored
    /// first, then halved and scaled: `floor(from + to) / 2 * k`.
    pub fn to_base(
        &self,
        year_month: &str,
        rates: &RateTable,
        base_currency: &str,
    ) -> Result<Option<NormalizedSalary>, InvalidAmount> {
        if self.currency.is_empty() {
            return Ok(None);
        }

        let is_base = self.currency == base_currency;
        let k = if is_base {
            1.0
        } else {
            match rates.rate(year_month, self.currency) {
                Some(rate) => rate,
                None => return Ok(None),
            }
        };

        match (self.from, self.to) {
            (None, None) => Ok(None),
            (Some(bound), None) | (None, Some(bound)) => {
                if is_base {
                    return Ok(Some(NormalizedSalary::Raw(bound.to_string())));
                }
                floor_to_i64(parse_bound(bound)? * k)
                    .map(|whole| Some(NormalizedSalary::Whole(whole)))
                    .ok_or_else(|| InvalidAmount(bound.to_string()))
            }
            (Some(from), Some(to)) => {
                let sum = parse_bound(from)? + parse_bound(to)?;
                Ok(Some(NormalizedSalary::Scaled(sum.floor() / 2.0 * k)))
            }
        }
    }
}
