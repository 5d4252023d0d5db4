use super::{Services, print_status, ui, watch_snapshots};
use crate::refresh::{CycleOutcome, UiSnapshot};
use crate::streams::Reading;
use crate::streams::conversion::{ConversionStream, ConversionView};
use anyhow::{Context, Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertArgs {
    pub amount: String,
    pub from: String,
    pub to: String,
    pub shares: Option<String>,
    /// Takes the amount and source currency from this stock's quote
    pub stock: Option<String>,
    pub watch: bool,
}

pub async fn run(services: &Services, args: &ConvertArgs) -> Result<()> {
    let stream = ConversionStream::new(
        Arc::clone(&services.rates),
        Arc::clone(&services.quotes),
        &services.config.refresh.conversion,
        services.timeout(),
    );
    // Neither call converts yet, the amount is still empty
    drop(stream.select_from(&args.from));
    drop(stream.select_to(&args.to));
    if let Some(shares) = &args.shares {
        if !stream.on_shares_changed(shares) {
            bail!("Invalid share count: {shares}");
        }
    }

    let spinner = ui::new_spinner(&format!("Converting {} to {}", args.from, args.to));
    let outcome = match &args.stock {
        Some(symbol) => {
            // The quote's currency is only used when it is a known one
            let loaded = stream
                .load_currencies()
                .await
                .context("Failed to load currencies");
            if let Err(e) = loaded {
                spinner.finish_and_clear();
                return Err(e);
            }
            let selected = stream
                .select_stock(symbol)
                .await
                .with_context(|| format!("Failed to load quote for {symbol}"));
            match selected {
                Ok(Some(outcome)) => outcome,
                Ok(None) => convert_form(&stream).await?,
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e);
                }
            }
        }
        None => {
            if !stream.on_amount_changed(&args.amount) {
                spinner.finish_and_clear();
                bail!("Invalid amount: {}", args.amount);
            }
            convert_form(&stream).await?
        }
    };
    spinner.finish_and_clear();

    let snapshot = stream.snapshot();
    render(&snapshot);
    // Auto-refresh only starts after a successful load
    if outcome == CycleOutcome::Failed {
        stream.stop();
        bail!(
            "{}",
            snapshot.error.as_deref().unwrap_or("Conversion failed")
        );
    }

    if args.watch {
        watch_snapshots(stream.subscribe(), render).await?;
    }
    stream.stop();
    Ok(())
}

/// Converts the form's current request right away instead of waiting out the
/// debounce.
async fn convert_form(stream: &ConversionStream) -> Result<CycleOutcome> {
    let request = stream
        .form()
        .request()
        .context("Amount must be a positive number")?;
    Ok(stream.controller().refresh_with(request).await)
}

fn render(snapshot: &UiSnapshot<ConversionView>) {
    let Some(view) = &snapshot.value else {
        print_status(snapshot);
        return;
    };
    let request = &view.request;
    println!(
        "{}",
        ui::style_text(
            &format!("{} → {}", request.from, request.to),
            ui::StyleType::Title
        )
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new(format!("Amount ({})", request.from)),
        ui::number_cell(request.amount, 2),
    ]);
    table.add_row(vec![
        Cell::new(format!("Converted ({})", request.to)),
        ui::reading_cell(view.converted),
    ]);
    match &view.result {
        Some(result) => {
            table.add_row(vec![Cell::new("Rate"), Cell::new(result.rate_label())]);
            table.add_row(vec![
                Cell::new("Inverse"),
                Cell::new(format!(
                    "1 {} = {:.4} {}",
                    result.to, result.inverse_rate, result.from
                )),
            ]);
        }
        None => {
            table.add_row(vec![Cell::new("Rate"), ui::na_cell(snapshot.error.is_some())]);
        }
    }
    if view.total_in_from != Reading::Blank {
        table.add_row(vec![
            Cell::new(format!("Total ({})", request.from)),
            ui::reading_cell(view.total_in_from),
        ]);
        table.add_row(vec![
            Cell::new(format!("Total ({})", request.to)),
            ui::reading_cell(view.total_in_to),
        ]);
    }
    if let Some(series) = view.series() {
        let rates: Vec<f64> = series.samples().iter().map(|s| s.rate).collect();
        table.add_row(vec![Cell::new("Trend"), Cell::new(ui::sparkline(&rates))]);
    }
    if let Some(delta) = view.delta() {
        table.add_row(vec![Cell::new("Change"), ui::signed_cell(delta, 4, "")]);
    }
    println!("{table}");
    print_status(snapshot);
}
