use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One portfolio position from the holdings source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub yesterday_price: Option<Decimal>,
    #[serde(default)]
    pub variation_percent: Option<f64>,
}

/// Analyst verdict for a holding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Recommendation {
    Buy,
    Sell,
    Retain,
}

impl Recommendation {
    /// Case-insensitive match against the fixed verdict set
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Some(Recommendation::Buy),
            "SELL" => Some(Recommendation::Sell),
            "RETAIN" => Some(Recommendation::Retain),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Buy => write!(f, "BUY"),
            Recommendation::Sell => write!(f, "SELL"),
            Recommendation::Retain => write!(f, "RETAIN"),
        }
    }
}

/// Terminal status of one entity's run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ResultStatus {
    Accepted,
    Exhausted,
    InvocationFailed,
    TimedOut,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Accepted => write!(f, "ACCEPTED"),
            ResultStatus::Exhausted => write!(f, "EXHAUSTED"),
            ResultStatus::InvocationFailed => write!(f, "INVOCATION_FAILED"),
            ResultStatus::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Why a single field failed validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum IssueKind {
    Missing,
    WrongType,
    OutOfEnum,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Missing => write!(f, "missing"),
            IssueKind::WrongType => write!(f, "wrong type"),
            IssueKind::OutOfEnum => write!(f, "out of enum"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldIssue {
    pub field: String,
    pub kind: IssueKind,
}

impl FieldIssue {
    pub fn new(field: &str, kind: IssueKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

/// Outcome of checking one extracted payload against the field contract.
/// Issue order follows the contract's field order so corrective prompts
/// stay deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub issues: Vec<FieldIssue>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.field.clone()).collect()
    }

    /// One line per issue, for prompt feedback
    pub fn describe(&self) -> String {
        self.issues
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One validated (or failure-marked) record per entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    pub attempts: u32,
}

impl AnalysisResult {
    /// Failure-marked record: occupies the entity's slot in the report,
    /// carries diagnostics instead of recommendation fields
    pub fn failed(
        symbol: &str,
        status: ResultStatus,
        error: impl Into<String>,
        missing_fields: Vec<String>,
        attempts: u32,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            status,
            recommendation: None,
            estimated_return: None,
            confidence: None,
            risk_notes: None,
            sources: Vec::new(),
            error: Some(error.into()),
            missing_fields,
            attempts,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ResultStatus::Accepted
    }
}

/// Accepted value grouped by the holding's sector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorBucket {
    pub sector: String,
    pub holdings: usize,
    pub value: Decimal,
}

/// Final aggregate over one run: per-entity results in input order plus
/// portfolio-level summary fields. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<AnalysisResult>,
    pub overall_confidence: f64,
    pub sector_summary: Vec<SectorBucket>,
    pub needs_follow_up: bool,
    pub accepted_count: usize,
    pub failed_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_parse_is_case_insensitive() {
        assert_eq!(Recommendation::parse("buy"), Some(Recommendation::Buy));
        assert_eq!(Recommendation::parse(" SELL "), Some(Recommendation::Sell));
        assert_eq!(Recommendation::parse("Retain"), Some(Recommendation::Retain));
        assert_eq!(Recommendation::parse("HOLD"), None);
    }

    #[test]
    fn failed_result_carries_diagnostics_only() {
        let r = AnalysisResult::failed(
            "INFY",
            ResultStatus::Exhausted,
            "validation did not succeed",
            vec!["confidence".to_string()],
            3,
        );
        assert!(!r.is_accepted());
        assert!(r.recommendation.is_none());
        assert_eq!(r.missing_fields, vec!["confidence"]);
        assert_eq!(r.attempts, 3);

        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("recommendation").is_none());
        assert_eq!(json["error"], "validation did not succeed");
    }
}
