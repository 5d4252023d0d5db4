use super::{Services, print_status, ui, watch_snapshots};
use crate::refresh::{CycleOutcome, UiSnapshot};
use crate::streams::stocks::{StockBoard, StockCategory, StockStream};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(services: &Services, category: StockCategory, watch: bool) -> Result<()> {
    let stream = StockStream::new(
        Arc::clone(&services.quotes),
        &services.config.refresh.stocks,
        services.timeout(),
    );

    let spinner = ui::new_spinner(&format!("Loading {} stocks", category.label()));
    let outcome = stream.load(category).await;
    spinner.finish_and_clear();

    let snapshot = stream.snapshot();
    render(&snapshot);
    if outcome == CycleOutcome::Failed {
        stream.stop();
        bail!(
            "{}",
            snapshot.error.as_deref().unwrap_or("Failed to load stocks")
        );
    }

    if watch {
        watch_snapshots(stream.subscribe(), render).await?;
    }
    stream.stop();
    Ok(())
}

fn render(snapshot: &UiSnapshot<StockBoard>) {
    let Some(board) = &snapshot.value else {
        print_status(snapshot);
        return;
    };
    println!(
        "\n{}",
        ui::style_text(board.category.label(), ui::StyleType::Title)
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("% Change"),
        ui::header_cell("Exchange"),
        ui::header_cell("Trend"),
    ]);
    for quote in &board.quotes {
        let trend = board
            .series(&quote.symbol)
            .map(|series| {
                let prices: Vec<f64> = series.samples().iter().map(|s| s.price).collect();
                ui::sparkline(&prices)
            })
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&quote.symbol),
            Cell::new(&quote.name),
            ui::number_cell(quote.price, 2),
            ui::signed_cell(quote.change, 2, ""),
            ui::change_cell(quote.percent_change),
            Cell::new(&quote.exchange),
            Cell::new(trend),
        ]);
    }
    println!("{table}");
    print_status(snapshot);
}
