use super::{equities, foreign, funds, ui};
use crate::core::{
    EnrichedEquity, EnrichedForeignAsset, EnrichedFund, EnrichmentError, Enricher, FxRate,
    PortfolioOverview,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

/// Single JSON document for every asset class. A failed class is `null`
/// and its message is listed under `errors`.
#[derive(Debug, Serialize)]
struct PortfolioReport<'a> {
    equities: Option<&'a [EnrichedEquity]>,
    funds: Option<&'a [EnrichedFund]>,
    foreign_assets: Option<&'a [EnrichedForeignAsset]>,
    fx_rate: Option<&'a FxRate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<&'static str, String>,
}

/// Formats an error with its sources, outermost first.
fn error_chain(error: &EnrichmentError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    message
}

fn failures(overview: &PortfolioOverview) -> Vec<(&'static str, &EnrichmentError)> {
    [
        ("equities", overview.equities.as_ref().err()),
        ("funds", overview.funds.as_ref().err()),
        ("foreign_assets", overview.foreign.as_ref().err()),
    ]
    .into_iter()
    .filter_map(|(name, error)| error.map(|e| (name, e)))
    .collect()
}

pub fn render_json(overview: &PortfolioOverview) -> Result<String> {
    let foreign = overview.foreign.as_ref().ok();
    let report = PortfolioReport {
        equities: overview.equities.as_deref().ok(),
        funds: overview.funds.as_deref().ok(),
        foreign_assets: foreign.map(|f| f.assets.as_slice()),
        fx_rate: foreign.map(|f| &f.fx_rate),
        errors: failures(overview)
            .into_iter()
            .map(|(name, e)| (name, error_chain(e)))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Enriches every class at once, then prints them together. Fails only when
/// no class could be loaded.
pub async fn run(enricher: &Enricher, user_id: i64, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching market data...");
    let overview = enricher.get_portfolio(user_id).await;
    pb.finish_and_clear();

    if json {
        println!("{}", render_json(&overview)?);
    } else {
        let sections = [
            ("equities", overview.equities.as_deref().map(equities::render)),
            ("funds", overview.funds.as_deref().map(funds::render)),
            ("foreign assets", overview.foreign.as_ref().map(foreign::render)),
        ];
        for (i, (name, section)) in sections.iter().enumerate() {
            match section {
                Ok(output) => println!("{output}"),
                Err(e) => eprintln!(
                    "{}",
                    ui::style_text(
                        &format!("Could not load {name}: {}", error_chain(e)),
                        ui::StyleType::Error
                    )
                ),
            }
            if i < sections.len() - 1 {
                ui::print_separator();
            }
        }
    }

    let failed = failures(&overview);
    for (name, e) in &failed {
        tracing::error!(error = %error_chain(e), "Failed to load {name}");
    }
    if failed.len() == 3 {
        anyhow::bail!("Failed to load market data for every asset class");
    }
    Ok(())
}
