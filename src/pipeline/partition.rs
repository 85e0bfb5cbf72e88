//! Splits the vacancy export into one file per publication year and counts
//! how often each salary currency is used.

use crate::core::PipelineError;
use crate::pipeline::csv_io;
use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CURRENCY_COLUMN: &str = "salary_currency";

/// Returns the first `n` characters of `s`, or all of it when shorter.
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One data row of the export, kept exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub struct VacancyRecord(StringRecord);

impl VacancyRecord {
    pub fn new(record: StringRecord) -> Self {
        VacancyRecord(record)
    }

    /// Field at `index`, or `""` when the row is shorter.
    pub fn field(&self, index: usize) -> &str {
        self.0.get(index).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The trailing publication date field.
    pub fn date(&self) -> &str {
        self.0.iter().last().unwrap_or("")
    }

    /// First four characters of the date. Not validated.
    pub fn year(&self) -> &str {
        char_prefix(self.date(), 4)
    }

    /// First seven characters of the date, `YYYY-MM` for well formed rows.
    pub fn year_month(&self) -> &str {
        char_prefix(self.date(), 7)
    }

    pub fn as_record(&self) -> &StringRecord {
        &self.0
    }
}

/// Occurrences of each salary currency, keyed by the uppercased code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrencyFrequency(BTreeMap<String, u64>);

impl CurrencyFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence. Empty codes are ignored.
    pub fn record(&mut self, code: &str) {
        if code.is_empty() {
            return;
        }
        *self.0.entry(code.to_uppercase()).or_insert(0) += 1;
    }

    /// Count for `code`; unseen codes count as zero.
    pub fn count(&self, code: &str) -> u64 {
        self.0.get(code).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(code, count)| (code.as_str(), *count))
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for CurrencyFrequency {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        CurrencyFrequency(
            iter.into_iter()
                .map(|(code, count)| (code.as_ref().to_uppercase(), count))
                .collect(),
        )
    }
}

/// A fully read export, grouped by year.
#[derive(Debug, Clone)]
pub struct Partitioned {
    pub header: StringRecord,
    pub years: BTreeMap<String, Vec<VacancyRecord>>,
    pub frequency: CurrencyFrequency,
}

fn is_year(key: &str) -> bool {
    key.len() == 4 && key.bytes().all(|b| b.is_ascii_digit())
}

/// File name of the partition holding `key`.
///
/// Path separators are percent-encoded (and `%` itself, so distinct keys never
/// share a file). Every other key is used as is, including empty and
/// dot-only ones: `.csv` and `..csv` are ordinary file names.
pub fn partition_file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            _ => name.push(c),
        }
    }
    name.push_str(".csv");
    name
}

/// Reads the export at `source` in one pass.
///
/// Fails with [`PipelineError::Schema`] when the header has no
/// `salary_currency` column.
pub fn parse_source(source: &Path) -> Result<Partitioned> {
    let mut reader = csv_io::open_reader(source)?;
    let header = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", source.display()))?
        .clone();

    let currency_index = header
        .iter()
        .position(|name| name == CURRENCY_COLUMN)
        .ok_or_else(|| PipelineError::Schema {
            column: CURRENCY_COLUMN.to_string(),
            path: source.display().to_string(),
        })?;
    debug!("Currency column at index {}", currency_index);

    let mut years: BTreeMap<String, Vec<VacancyRecord>> = BTreeMap::new();
    let mut frequency = CurrencyFrequency::new();

    for row in reader.records() {
        let record = VacancyRecord::new(
            row.with_context(|| format!("Failed to read row of {}", source.display()))?,
        );
        frequency.record(record.field(currency_index));
        years
            .entry(record.year().to_string())
            .or_default()
            .push(record);
    }

    for key in years.keys().filter(|key| !is_year(key)) {
        warn!("Rows with unrecognised year '{}' kept in their own partition", key);
    }

    let partitioned = Partitioned {
        header,
        years,
        frequency,
    };
    info!(
        "Read {} rows across {} years from {}",
        partitioned.total_rows(),
        partitioned.years.len(),
        source.display()
    );
    Ok(partitioned)
}

impl Partitioned {
    pub fn total_rows(&self) -> usize {
        self.years.values().map(Vec::len).sum()
    }

    pub fn row_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.years
            .iter()
            .map(|(year, rows)| (year.as_str(), rows.len()))
    }

    /// Inclusive range of the well formed years, used to decide which months
    /// of rates to fetch.
    pub fn year_window(&self) -> Result<(i32, i32)> {
        let mut valid = self
            .years
            .keys()
            .filter(|key| is_year(key))
            .filter_map(|key| key.parse::<i32>().ok());
        let first = valid
            .next()
            .ok_or_else(|| anyhow!("No rows with a recognisable year"))?;
        let last = valid.last().unwrap_or(first);
        Ok((first, last))
    }

    /// Writes `{year}.csv` for every partition into `dir`, creating it when
    /// missing, and returns the written paths in year order. See
    /// [`partition_file_name`] for keys that are not plain years.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut written = Vec::with_capacity(self.years.len());
        for (year, rows) in &self.years {
            let path = dir.join(partition_file_name(year));
            let mut writer = csv_io::create_writer(&path)?;
            writer.write_record(&self.header)?;
            for row in rows {
                writer.write_record(row.as_record())?;
            }
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Wrote {} rows to {}", rows.len(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SOURCE: &str = "\u{feff}name,salary_from,salary_to,salary_currency,area_name,published_at\n\
        A,100,200,usd,Moscow,2019-03-01T10:00:00+0300\n\
        B,,300,RUR,Kazan,2020-01-15T10:00:00+0300\n\
        C,50,,USD,Moscow,2019-12-31T23:00:00+0300\n\
        D,,,,Omsk,2020-02-01T09:00:00+0300\n\
        E,10,20,EUR,Perm,2019-07-07T07:00:00+0300\n";

    fn write_source(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("vacancies.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_record_accessors() {
        let record = VacancyRecord::new(StringRecord::from(vec![
            "A",
            "1",
            "2",
            "USD",
            "Moscow",
            "2020-05-17T10:00:00",
        ]));
        assert_eq!(record.date(), "2020-05-17T10:00:00");
        assert_eq!(record.year(), "2020");
        assert_eq!(record.year_month(), "2020-05");
        assert_eq!(record.field(3), "USD");
        assert_eq!(record.field(42), "");
    }

    #[test]
    fn test_short_date_yields_whole_field() {
        let record = VacancyRecord::new(StringRecord::from(vec!["A", "20"]));
        assert_eq!(record.year(), "20");
        assert_eq!(record.year_month(), "20");
    }

    #[test]
    fn test_frequency_is_case_insensitive_and_skips_empty() {
        let mut frequency = CurrencyFrequency::new();
        for code in ["usd", "USD", "", "Eur", "USD"] {
            frequency.record(code);
        }
        assert_eq!(frequency.count("USD"), 3);
        assert_eq!(frequency.count("EUR"), 1);
        assert_eq!(frequency.count("KZT"), 0);
        assert_eq!(frequency.iter().count(), 2);
    }

    #[test]
    fn test_parse_groups_rows_by_year_in_source_order() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);

        let partitioned = parse_source(&source).unwrap();
        assert_eq!(partitioned.total_rows(), 5);
        assert_eq!(
            partitioned.years.keys().collect::<Vec<_>>(),
            vec!["2019", "2020"]
        );

        let names_2019: Vec<_> = partitioned.years["2019"]
            .iter()
            .map(|r| r.field(0).to_string())
            .collect();
        assert_eq!(names_2019, vec!["A", "C", "E"]);
        let names_2020: Vec<_> = partitioned.years["2020"]
            .iter()
            .map(|r| r.field(0).to_string())
            .collect();
        assert_eq!(names_2020, vec!["B", "D"]);

        assert_eq!(partitioned.frequency.count("USD"), 2);
        assert_eq!(partitioned.frequency.count("RUR"), 1);
        assert_eq!(partitioned.frequency.count("EUR"), 1);
        assert_eq!(partitioned.year_window().unwrap(), (2019, 2020));
    }

    #[test]
    fn test_missing_currency_column_is_schema_error() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), "name,salary_from,published_at\nA,1,2020-01-01\n");

        let err = parse_source(&source).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Schema { column, .. }) => assert_eq!(column, "salary_currency"),
            other => panic!("Expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_year_is_kept_but_outside_window() {
        let dir = tempdir().unwrap();
        let source = write_source(
            dir.path(),
            "name,salary_currency,published_at\nA,USD,2021-01-01\nB,USD,unknown\n",
        );

        let partitioned = parse_source(&source).unwrap();
        assert_eq!(partitioned.years["unkn"].len(), 1);
        assert_eq!(partitioned.year_window().unwrap(), (2021, 2021));
    }

    #[test]
    fn test_window_requires_a_valid_year() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), "name,salary_currency,published_at\nA,USD,soon\n");

        let partitioned = parse_source(&source).unwrap();
        assert!(partitioned.year_window().is_err());
    }

    #[test]
    fn test_write_creates_one_file_per_year() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), SOURCE);
        let out = dir.path().join("nested").join("years");

        let partitioned = parse_source(&source).unwrap();
        let written = partitioned.write(&out).unwrap();
        assert_eq!(written, vec![out.join("2019.csv"), out.join("2020.csv")]);

        let content = std::fs::read_to_string(out.join("2020.csv")).unwrap();
        assert_eq!(
            content,
            "\u{feff}name,salary_from,salary_to,salary_currency,area_name,published_at\r\n\
             B,,300,RUR,Kazan,2020-01-15T10:00:00+0300\r\n\
             D,,,,Omsk,2020-02-01T09:00:00+0300\r\n"
        );
    }

    #[test]
    fn test_partition_file_names() {
        assert_eq!(partition_file_name("2021"), "2021.csv");
        assert_eq!(partition_file_name(""), ".csv");
        assert_eq!(partition_file_name(".."), "...csv");
        assert_eq!(partition_file_name("12/0"), "12%2F0.csv");
        assert_eq!(partition_file_name("1\\%2"), "1%5C%252.csv");
    }

    #[test]
    fn test_write_keeps_every_garbage_year() {
        let dir = tempdir().unwrap();
        let source = write_source(
            dir.path(),
            "name,salary_currency,published_at\n\
             A,USD,2021-01-01\n\
             B,USD,\n\
             C,USD,..x\n\
             D,USD,12/05/2021\n",
        );
        let out = dir.path().join("years");

        let partitioned = parse_source(&source).unwrap();
        assert_eq!(
            partitioned.years.keys().collect::<Vec<_>>(),
            vec!["", "..x", "12/0", "2021"]
        );

        let written = partitioned.write(&out).unwrap();
        assert_eq!(
            written,
            vec![
                out.join(".csv"),
                out.join("..x.csv"),
                out.join("12%2F0.csv"),
                out.join("2021.csv"),
            ]
        );

        let empty_year = std::fs::read_to_string(out.join(".csv")).unwrap();
        assert_eq!(
            empty_year,
            "\u{feff}name,salary_currency,published_at\r\nB,USD,\r\n"
        );
        assert_eq!(partitioned.year_window().unwrap(), (2021, 2021));
    }
}
