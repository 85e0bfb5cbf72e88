//! CSV plumbing shared by the pipeline phases.
//!
//! Every file the pipeline writes starts with a UTF-8 byte-order mark and uses
//! CRLF record terminators with minimal quoting, the layout the vacancy exports
//! already come in. Inputs may or may not carry the mark.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub type CsvReader = csv::Reader<BufReader<File>>;
pub type CsvWriter = csv::Writer<BufWriter<File>>;

fn skip_bom<R: BufRead>(reader: &mut R) -> io::Result<()> {
    let buf = reader.fill_buf()?;
    if buf.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(())
}

/// Opens a headed CSV file, skipping a leading byte-order mark.
pub fn open_reader(path: &Path) -> Result<CsvReader> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    skip_bom(&mut reader).with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader))
}

/// Creates (or truncates) a CSV file and writes the byte-order mark.
pub fn create_writer(path: &Path) -> Result<CsvWriter> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(UTF8_BOM)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .flexible(true)
        .from_writer(out))
}

/// Renders a float the way the exports expect: shortest round-trip digits,
/// with a trailing `.0` on whole values (`780.0`, `0.013`). Magnitudes below
/// `1e-4` or from `1e16` up use a signed two-digit exponent (`1.234e-05`,
/// `1e+16`).
pub fn format_decimal(value: f64) -> String {
    let magnitude = value.abs();
    if value.is_finite() && magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let exp = format!("{value:e}");
        if let Some((mantissa, exponent)) = exp.split_once('e') {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            return format!("{mantissa}e{sign}{digits:0>2}");
        }
    }

    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
