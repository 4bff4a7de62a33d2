use crate::types::{Holding, ValidationOutcome};
use crate::util;

/// What one retry run is analyzing: the combined portfolio or one holding
#[derive(Debug, Clone, Copy)]
pub enum PromptContext<'a> {
    Portfolio { summary: &'a str },
    Holding { holding: &'a Holding },
}

impl PromptContext<'_> {
    pub fn label(&self) -> &str {
        match self {
            PromptContext::Portfolio { .. } => "PORTFOLIO",
            PromptContext::Holding { holding } => &holding.symbol,
        }
    }
}

const PORTFOLIO_TEMPLATE: &str = r#"You are an expert financial advisor and portfolio analyst reviewing a stock holdings portfolio.

Output ONLY a JSON object with these exact keys:
{"recommendation": "BUY|SELL|RETAIN", "confidence": 0.XX, "risk_notes": "key risk factors for the portfolio", "sources": ["source1", "source2"]}

RULES:
- recommendation = your overall stance on the portfolio as positioned today
- confidence = how certain you are of this assessment (0.0 to 1.0)
- risk_notes = concentration, sector, and market risks, 2-3 sentences
- sources = the kinds of evidence you relied on (news, financial report, market data)
- Be specific and factual. Cite numbers when possible.
- Do NOT wrap in markdown code blocks."#;

const HOLDING_TEMPLATE: &str = r#"You are a senior equity research analyst assessing a single stock holding.

Output ONLY a JSON object with these exact keys:
{"recommendation": "BUY|SELL|RETAIN", "estimated_return": 0.XX or null, "confidence": 0.XX, "risk_notes": "key risks for this position", "sources": ["source1", "source2"]}

RULES:
- recommendation = BUY, SELL, or RETAIN for this position
- estimated_return = expected 1-year return in percent, or null if you cannot estimate
- confidence = how certain you are (0.0 to 1.0)
- risk_notes = company and sector risks, 1-2 sentences
- sources = the kinds of evidence you relied on (news, financial report, market data)
- Focus on events from the last few days that affect this stock
- Do NOT wrap in markdown code blocks."#;

// Previous output is quoted back verbatim up to this many bytes
const PREVIOUS_OUTPUT_CAP: usize = 1200;

/// First-attempt prompt for the given context. Pure construction.
pub fn initial(ctx: &PromptContext<'_>) -> String {
    match ctx {
        PromptContext::Portfolio { summary } => {
            format!(
                "{PORTFOLIO_TEMPLATE}\n\n\
                PORTFOLIO HOLDINGS DATA:\n{summary}\n\n\
                Provide your consolidated portfolio assessment."
            )
        }
        PromptContext::Holding { holding } => {
            let variation = match (holding.yesterday_price, holding.variation_percent) {
                (Some(prev), Some(pct)) => {
                    format!("Yesterday Price: {prev}\nPrice Change: {pct:+.2}%\n")
                }
                _ => String::new(),
            };
            format!(
                "{HOLDING_TEMPLATE}\n\n\
                Stock Information:\n\
                Symbol: {symbol}\n\
                Company: {company}\n\
                Quantity Held: {qty}\n\
                Current Price: {price}\n\
                Holding Value: {value}\n\
                Sector: {sector}\n\
                {variation}\
                \nProvide your assessment of this holding.",
                symbol = holding.symbol,
                company = holding.company_name.as_deref().unwrap_or(&holding.symbol),
                qty = holding.quantity,
                price = holding.price,
                value = holding.value,
                sector = holding.sector.as_deref().unwrap_or("Unknown"),
            )
        }
    }
}

/// Self-correction prompt: quotes the previous output and names exactly
/// which fields were missing or malformed, so the next attempt is
/// constrained rather than a blind retry.
pub fn corrective(
    ctx: &PromptContext<'_>,
    previous_output: &str,
    outcome: &ValidationOutcome,
) -> String {
    let previous = util::truncate(previous_output, PREVIOUS_OUTPUT_CAP);
    format!(
        "You previously analyzed {label}, but your response could not be used:\n\n\
        PREVIOUS RESPONSE:\n{previous}\n\n\
        PROBLEMS:\n{problems}\n\n\
        Correct your response. Ensure:\n\
        1. The response is a single valid JSON object\n\
        2. All required fields are present with the exact key names\n\
        3. recommendation is one of BUY, SELL, RETAIN\n\
        4. confidence is a number between 0.0 and 1.0\n\n\
        Provide ONLY the corrected JSON object:",
        label = ctx.label(),
        problems = outcome.describe(),
    )
}
