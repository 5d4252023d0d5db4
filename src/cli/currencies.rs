use super::{Services, ui};
use crate::streams::conversion::ConversionStream;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(services: &Services) -> Result<()> {
    let stream = ConversionStream::new(
        Arc::clone(&services.rates),
        Arc::clone(&services.quotes),
        &services.config.refresh.conversion,
        services.timeout(),
    );
    let spinner = ui::new_spinner("Loading currencies");
    let loaded = stream.load_currencies().await;
    spinner.finish_and_clear();
    stream.stop();
    let currencies = loaded.context("Failed to load currencies")?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);
    for item in &currencies {
        table.add_row(vec![Cell::new(&item.code), Cell::new(&item.name)]);
    }
    println!("{table}");
    println!(
        "{}",
        ui::style_text(
            &format!("{} currencies", currencies.len()),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}
