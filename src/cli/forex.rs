use super::{Services, print_status, ui, watch_snapshots};
use crate::refresh::{CycleOutcome, UiSnapshot};
use crate::streams::forex::{ForexBoard, ForexStream, parse_pairs};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(services: &Services, watch: bool) -> Result<()> {
    let pairs = parse_pairs(&services.config.forex_pairs)?;
    if pairs.is_empty() {
        println!("No forex pairs configured.");
        return Ok(());
    }
    let stream = ForexStream::new(
        Arc::clone(&services.rates),
        pairs,
        &services.config.refresh.forex,
        services.timeout(),
    );

    let spinner = ui::new_spinner(&format!("Loading {} forex pairs", stream.pairs().len()));
    let outcome = stream.refresh().await;
    spinner.finish_and_clear();

    let snapshot = stream.snapshot();
    render(&snapshot);
    if outcome == CycleOutcome::Failed {
        stream.stop();
        bail!(
            "{}",
            snapshot.error.as_deref().unwrap_or("Failed to load forex pairs")
        );
    }

    if watch {
        watch_snapshots(stream.subscribe(), render).await?;
    }
    stream.stop();
    Ok(())
}

fn render(snapshot: &UiSnapshot<ForexBoard>) {
    let Some(board) = &snapshot.value else {
        print_status(snapshot);
        return;
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Change"),
        ui::header_cell("Trend"),
    ]);
    for view in &board.pairs {
        let rates: Vec<f64> = view.history.samples().iter().map(|s| s.rate).collect();
        table.add_row(vec![
            Cell::new(view.pair.to_string()),
            ui::number_cell(view.rate, 4),
            view.change
                .map_or_else(|| ui::na_cell(false), |c| ui::signed_cell(c, 4, "")),
            Cell::new(ui::sparkline(&rates)),
        ]);
    }
    println!("{table}");
    print_status(snapshot);
}
