use crate::types::Holding;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Ordered holdings plus portfolio totals, as supplied by the EOD exporter
#[derive(Debug, Clone)]
pub struct HoldingsData {
    pub holdings: Vec<Holding>,
    pub total_value: Decimal,
    pub source: String,
}

/// On-disk shape of an EOD holdings file
#[derive(Deserialize)]
struct HoldingsFile {
    holdings: Vec<Holding>,
    #[serde(default)]
    total_value: Option<Decimal>,
    #[serde(default)]
    source_file: Option<String>,
}

impl HoldingsData {
    pub fn from_holdings(holdings: Vec<Holding>, source: &str) -> Self {
        let total_value = holdings.iter().map(|h| h.value).sum();
        Self {
            holdings,
            total_value,
            source: source.to_string(),
        }
    }
}

/// Parse an EOD holdings document. Input order is preserved; it drives the
/// slot order of the final report.
pub fn parse(data: &str, source: &str) -> Result<HoldingsData> {
    let file: HoldingsFile = serde_json::from_str(data).context("Parse holdings JSON")?;
    let total_value = file
        .total_value
        .unwrap_or_else(|| file.holdings.iter().map(|h| h.value).sum());
    Ok(HoldingsData {
        holdings: file.holdings,
        total_value,
        source: file.source_file.unwrap_or_else(|| source.to_string()),
    })
}

pub fn load_from_json(path: &Path) -> Result<HoldingsData> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Read holdings file {}", path.display()))?;
    parse(&data, &path.display().to_string())
}

/// Format the whole portfolio for the LLM: totals, sector breakdown, then
/// individual positions sorted by value descending.
pub fn portfolio_summary(data: &HoldingsData) -> String {
    if data.holdings.is_empty() {
        return "No holdings in the portfolio.".to_string();
    }

    let count = data.holdings.len();
    let avg = data.total_value / Decimal::from(count as u64);

    let mut out = format!(
        "=== PORTFOLIO SUMMARY ===\n\
        Total Holdings: {count}\n\
        Total Portfolio Value: {total}\n\
        Average Holding Value: {avg:.2}\n\
        \n\
        === SECTOR BREAKDOWN ===\n",
        total = data.total_value,
    );

    let mut sectors: HashMap<&str, (usize, Decimal)> = HashMap::new();
    for h in &data.holdings {
        let sector = h.sector.as_deref().unwrap_or("Uncategorized");
        let entry = sectors.entry(sector).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += h.value;
    }
    let mut sectors: Vec<_> = sectors.into_iter().collect();
    sectors.sort_by(|a, b| b.1 .1.cmp(&a.1 .1).then(a.0.cmp(b.0)));
    for (sector, (n, value)) in &sectors {
        let pct = if data.total_value > Decimal::ZERO {
            value / data.total_value * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        out.push_str(&format!("{sector}: {n} holdings, {value} ({pct:.1}%)\n"));
    }

    out.push_str("\n=== INDIVIDUAL HOLDINGS ===\n");
    let mut sorted: Vec<&Holding> = data.holdings.iter().collect();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));
    for (i, h) in sorted.iter().enumerate() {
        out.push_str(&format!(
            "\n{idx}. {symbol} - {company}\n\
            \x20  Quantity: {qty} | Price: {price} | Value: {value}\n\
            \x20  Sector: {sector} | Exchange: {exchange}\n",
            idx = i + 1,
            symbol = h.symbol,
            company = h.company_name.as_deref().unwrap_or("N/A"),
            qty = h.quantity,
            price = h.price,
            value = h.value,
            sector = h.sector.as_deref().unwrap_or("N/A"),
            exchange = h.exchange.as_deref().unwrap_or("N/A"),
        ));
    }

    out
}
