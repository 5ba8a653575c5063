use super::ui;
use crate::core::{Enricher, ForeignPortfolio};
use anyhow::Result;
use comfy_table::Cell;

pub fn render(portfolio: &ForeignPortfolio) -> String {
    let fx = &portfolio.fx_rate;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Description"),
        ui::header_cell("Quantity"),
        ui::header_cell(&format!("Price ({})", fx.from)),
        ui::header_cell(&format!("Value ({})", fx.from)),
        ui::header_cell(&format!("Value ({})", fx.to)),
    ]);

    for asset in &portfolio.assets {
        table.add_row(vec![
            Cell::new(&asset.ticker),
            Cell::new(asset.description.as_deref().unwrap_or("")),
            Cell::new(format!("{:.4}", asset.quantity)),
            ui::number_cell(asset.unit_price, |p| format!("{p:.2}")),
            ui::number_cell(asset.total_value, |v| format!("{v:.2}")),
            ui::number_cell(asset.total_value_local, |v| format!("{v:.2}")),
        ]);
    }

    let total: f64 = portfolio.assets.iter().map(|a| a.total_value_local).sum();
    let title = format!("Foreign Assets ({}/{} {:.4})", fx.from, fx.to, fx.rate);
    ui::titled_table(&title, &table, &fx.to, total)
}

pub async fn run(enricher: &Enricher, user_id: i64, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching foreign market data...");
    let result = enricher.get_foreign_assets(user_id).await;
    pb.finish_and_clear();

    let portfolio = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&portfolio)?);
    } else {
        println!("{}", render(&portfolio));
    }
    Ok(())
}
