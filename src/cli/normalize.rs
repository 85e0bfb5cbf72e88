use super::ui;
use crate::core::config::AppConfig;
use crate::pipeline::batch::{self, YearReport};
use crate::pipeline::rates::RateTable;
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;
use tracing::info;

pub fn display_reports(reports: &[YearReport]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Year"),
        ui::header_cell("Rows"),
        ui::header_cell("Converted"),
        ui::header_cell("Empty"),
        ui::header_cell("Malformed"),
    ]);

    for report in reports {
        table.add_row(vec![
            Cell::new(&report.year),
            ui::count_cell(report.rows, false),
            ui::count_cell(report.converted, false),
            ui::count_cell(report.empty, false),
            ui::count_cell(report.malformed, true),
        ]);
    }

    let converted: u64 = reports.iter().map(|r| r.converted).sum();
    let rows: u64 = reports.iter().map(|r| r.rows).sum();
    format!(
        "{}\n{}\n\n{}: {} {}",
        ui::style_text("Normalized salaries", ui::StyleType::Title),
        table,
        ui::style_text("Converted", ui::StyleType::TotalLabel),
        ui::style_text(&converted.to_string(), ui::StyleType::TotalValue),
        ui::style_text(&format!("of {rows} rows"), ui::StyleType::Subtle),
    )
}

/// Rewrites every year partition using the persisted rate table.
pub async fn run(config: &AppConfig) -> Result<Vec<YearReport>> {
    let rates = Arc::new(RateTable::load(&config.rates_path)?);
    let inputs = batch::list_partitions(&config.partitions_dir)?;
    if inputs.is_empty() {
        bail!(
            "No partitions found in {}",
            config.partitions_dir.display()
        );
    }
    info!(
        "Loaded {} months of rates from {}",
        rates.len(),
        config.rates_path.display()
    );

    let pb = ui::new_progress_bar(inputs.len() as u64, "Normalizing");
    let result = batch::normalize_partitions(
        inputs,
        &config.output_dir,
        rates,
        &config.base_currency,
        config.concurrency.normalize_workers(),
        &pb,
    )
    .await;
    pb.finish_and_clear();
    let reports = result?;

    println!("{}", display_reports(&reports));
    Ok(reports)
}
