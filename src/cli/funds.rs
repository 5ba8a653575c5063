use super::ui;
use crate::core::{EnrichedFund, Enricher};
use anyhow::Result;
use comfy_table::Cell;

pub fn render(funds: &[EnrichedFund]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Segment"),
        ui::header_cell("Quantity"),
        ui::header_cell("Price"),
        ui::header_cell("Value"),
        ui::header_cell("P/VP"),
        ui::header_cell("DY (%)"),
        ui::header_cell("Vacancy (%)"),
        ui::header_cell("Properties"),
    ]);

    for fund in funds {
        table.add_row(vec![
            Cell::new(&fund.ticker),
            Cell::new(&fund.segment),
            Cell::new(format!("{:.0}", fund.quantity)),
            ui::number_cell(fund.price, |p| format!("{p:.2}")),
            ui::number_cell(fund.total_value, |v| format!("{v:.2}")),
            ui::number_cell(fund.price_to_book, |r| format!("{r:.2}")),
            ui::number_cell(fund.dividend_yield_percent, |y| format!("{y:.2}%")),
            Cell::new(format!("{:.2}%", fund.vacancy)),
            Cell::new(fund.property_count),
        ]);
    }

    let total: f64 = funds.iter().map(|f| f.total_value).sum();
    ui::titled_table("Real Estate Funds", &table, "BRL", total)
}

pub async fn run(enricher: &Enricher, user_id: i64, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching fund market data...");
    let result = enricher.get_funds(user_id).await;
    pb.finish_and_clear();

    let funds = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&funds)?);
    } else {
        println!("{}", render(&funds));
    }
    Ok(())
}
