use super::ui;
use crate::core::config::AppConfig;
use crate::pipeline::partition::{self, Partitioned};
use anyhow::Result;
use comfy_table::Cell;
use std::path::Path;
use tracing::info;

/// Renders rows per year and the currencies seen in the export.
pub fn display_partitions(partitioned: &Partitioned, min_count: u64) -> String {
    let mut years = ui::new_styled_table();
    years.set_header(vec![ui::header_cell("Year"), ui::header_cell("Rows")]);
    for (year, rows) in partitioned.row_counts() {
        years.add_row(vec![Cell::new(year), ui::count_cell(rows as u64, false)]);
    }

    let mut currencies = ui::new_styled_table();
    currencies.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Vacancies"),
        ui::header_cell("Rate column"),
    ]);
    for (code, count) in partitioned.frequency.iter() {
        let kept = if count > min_count { "yes" } else { "no" };
        currencies.add_row(vec![
            Cell::new(code),
            ui::count_cell(count, false),
            Cell::new(kept),
        ]);
    }

    format!(
        "{}\n{}\n\n{}\n{}\n\n{}: {}",
        ui::style_text("Vacancies per year", ui::StyleType::Title),
        years,
        ui::style_text("Salary currencies", ui::StyleType::Title),
        currencies,
        ui::style_text("Total rows", ui::StyleType::TotalLabel),
        ui::style_text(
            &partitioned.total_rows().to_string(),
            ui::StyleType::TotalValue
        ),
    )
}

/// Reads the export and writes one partition file per year.
pub fn run(config: &AppConfig, source: Option<&Path>) -> Result<Partitioned> {
    let source = source.unwrap_or(config.source.as_path());
    info!("Partitioning {}", source.display());

    let partitioned = partition::parse_source(source)?;
    let written = partitioned.write(&config.partitions_dir)?;
    info!(
        "Wrote {} partitions to {}",
        written.len(),
        config.partitions_dir.display()
    );

    println!(
        "{}",
        display_partitions(&partitioned, config.min_currency_count)
    );
    Ok(partitioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_writes_partitions_into_configured_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("vacancies.csv");
        std::fs::write(
            &source,
            "name,salary_from,salary_to,salary_currency,area_name,published_at\n\
             A,1,2,USD,Moscow,2018-01-01\n\
             B,3,4,usd,Moscow,2022-01-01\n",
        )?;
        let config = AppConfig {
            partitions_dir: temp_dir.path().join("years"),
            ..AppConfig::default()
        };

        let partitioned = run(&config, Some(source.as_path()))?;
        assert_eq!(partitioned.frequency.count("USD"), 2);
        assert!(config.partitions_dir.join("2018.csv").exists());
        assert!(config.partitions_dir.join("2022.csv").exists());

        let rendered = display_partitions(&partitioned, 1);
        assert!(rendered.contains("2018"));
        assert!(rendered.contains("USD"));
        assert!(rendered.contains("yes"));
        Ok(())
    }
}
