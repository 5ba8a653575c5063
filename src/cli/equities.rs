use super::ui;
use crate::core::{EnrichedEquity, Enricher};
use anyhow::Result;
use comfy_table::Cell;

pub fn render(equities: &[EnrichedEquity]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Quantity"),
        ui::header_cell("Price"),
        ui::header_cell("Value"),
        ui::header_cell("P/VP"),
        ui::header_cell("DY (%)"),
        ui::header_cell("Graham"),
    ]);

    for equity in equities {
        table.add_row(vec![
            Cell::new(&equity.ticker),
            Cell::new(format!("{:.0}", equity.quantity)),
            ui::number_cell(equity.price, |p| format!("{p:.2}")),
            ui::number_cell(equity.total_value, |v| format!("{v:.2}")),
            ui::number_cell(equity.price_to_book, |r| format!("{r:.2}")),
            ui::number_cell(equity.dividend_yield_percent, |y| format!("{y:.2}%")),
            if equity.graham_value > 0.0 {
                ui::flag_cell(
                    format!("{:.2}", equity.graham_value),
                    equity.is_graham_advantageous,
                )
            } else {
                ui::number_cell(0.0, |_| String::new())
            },
        ]);
    }

    let total: f64 = equities.iter().map(|e| e.total_value).sum();
    ui::titled_table("Equities", &table, "BRL", total)
}

pub async fn run(enricher: &Enricher, user_id: i64, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching equity market data...");
    let result = enricher.get_equities(user_id).await;
    pb.finish_and_clear();

    let equities = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&equities)?);
    } else {
        println!("{}", render(&equities));
    }
    Ok(())
}
