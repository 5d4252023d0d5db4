use super::{Services, ui};
use crate::refresh::CycleOutcome;
use crate::streams::search::SearchStream;
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(services: &Services, query: &str) -> Result<()> {
    let stream = SearchStream::new(
        Arc::clone(&services.quotes),
        &services.config.refresh.search,
        services.timeout(),
    );

    let spinner = ui::new_spinner(&format!("Searching for {}", query.trim().to_uppercase()));
    let outcome = stream.search_now(query).await;
    spinner.finish_and_clear();
    let snapshot = stream.snapshot();
    stream.stop();

    match outcome {
        CycleOutcome::Skipped => bail!("Search query must not be empty"),
        CycleOutcome::Failed => bail!(
            "{}",
            snapshot.error.as_deref().unwrap_or("Search failed")
        ),
        _ => {}
    }

    let matches = snapshot.value.as_deref().unwrap_or_default();
    if matches.is_empty() {
        println!("No stocks found for {}", query.trim().to_uppercase());
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Exchange"),
    ]);
    for m in matches {
        table.add_row(vec![
            Cell::new(&m.symbol),
            Cell::new(&m.name),
            Cell::new(&m.exchange),
        ]);
    }
    println!("{table}");
    Ok(())
}
