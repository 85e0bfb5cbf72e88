use super::ui;
use crate::core::MonthlyRateProvider;
use crate::core::config::AppConfig;
use crate::pipeline::partition::Partitioned;
use crate::pipeline::rates::{self, RateTable};
use anyhow::Result;
use comfy_table::Cell;
use tracing::info;

pub fn display_rate_table(table: &RateTable) -> String {
    let mut output = format!(
        "{}\n",
        ui::style_text("Exchange rates", ui::StyleType::Title)
    );

    if table.currencies().is_empty() {
        output.push_str(&ui::style_text(
            "No currency is frequent enough to get a rate column",
            ui::StyleType::Warning,
        ));
        return output;
    }

    let mut grid = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Month")];
    header.extend(table.currencies().iter().map(|code| ui::header_cell(code)));
    grid.set_header(header);

    for month in table.months() {
        let mut row = vec![Cell::new(month)];
        row.extend(
            table
                .currencies()
                .iter()
                .map(|code| ui::rate_cell(table.rate(month, code))),
        );
        grid.add_row(row);
    }
    output.push_str(&grid.to_string());
    output
}

/// Fetches the months covered by `partitioned`, filters rare currencies and
/// writes the rate table. Nothing is written when any month fails.
pub async fn run(
    config: &AppConfig,
    partitioned: &Partitioned,
    provider: &dyn MonthlyRateProvider,
) -> Result<RateTable> {
    let window = partitioned.year_window()?;
    let pb = ui::new_progress_bar(0, "Fetching rates");

    let result = rates::build_rate_table(
        provider,
        window,
        &partitioned.frequency,
        config.min_currency_count,
        config.concurrency.fetch,
        &pb,
    )
    .await;
    pb.finish_and_clear();
    let table = result?;

    table.write_csv(&config.rates_path)?;
    info!(
        "Rate table with {} currencies written to {}",
        table.currencies().len(),
        config.rates_path.display()
    );

    println!("{}", display_rate_table(&table));
    Ok(table)
}
