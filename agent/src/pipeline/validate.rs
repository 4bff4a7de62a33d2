use crate::types::{
    AnalysisResult, FieldIssue, IssueKind, Recommendation, ResultStatus, ValidationOutcome,
};
use serde_json::Value;

/// Which required-field contract applies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// One record for the combined portfolio
    Portfolio,
    /// One record per holding; additionally requires estimated_return
    PerHolding,
}

const BASE_FIELDS: &[&str] = &["recommendation", "confidence", "risk_notes", "sources"];

/// Check an extracted payload against the contract for `shape`. Returns the
/// ordered list of failing fields; empty means pass. Out-of-range confidence
/// is NOT an issue here — it gets clamped at record construction.
pub fn validate(payload: &Value, shape: Shape) -> ValidationOutcome {
    let mut issues = Vec::new();

    let obj = match payload.as_object() {
        Some(o) => o,
        None => {
            issues.push(FieldIssue::new("payload", IssueKind::WrongType));
            return ValidationOutcome { issues };
        }
    };

    for &field in BASE_FIELDS {
        if !obj.contains_key(field) {
            issues.push(FieldIssue::new(field, IssueKind::Missing));
        }
    }
    if shape == Shape::PerHolding && !obj.contains_key("estimated_return") {
        issues.push(FieldIssue::new("estimated_return", IssueKind::Missing));
    }

    if let Some(v) = obj.get("recommendation") {
        match v.as_str() {
            Some(s) if Recommendation::parse(s).is_some() => {}
            Some(_) => issues.push(FieldIssue::new("recommendation", IssueKind::OutOfEnum)),
            None => issues.push(FieldIssue::new("recommendation", IssueKind::WrongType)),
        }
    }
    if let Some(v) = obj.get("estimated_return") {
        if !v.is_number() && !v.is_null() {
            issues.push(FieldIssue::new("estimated_return", IssueKind::WrongType));
        }
    }
    if let Some(v) = obj.get("confidence") {
        if !v.is_number() {
            issues.push(FieldIssue::new("confidence", IssueKind::WrongType));
        }
    }
    if let Some(v) = obj.get("risk_notes") {
        if !v.is_string() {
            issues.push(FieldIssue::new("risk_notes", IssueKind::WrongType));
        }
    }
    if let Some(v) = obj.get("sources") {
        match v.as_array() {
            Some(items) if items.iter().all(Value::is_string) => {}
            _ => issues.push(FieldIssue::new("sources", IssueKind::WrongType)),
        }
    }

    ValidationOutcome { issues }
}

/// Build the accepted record from a payload that passed `validate`.
/// Confidence outside [0,1] is clamped, not rejected.
pub fn to_result(payload: &Value, symbol: &str, attempts: u32) -> AnalysisResult {
    let recommendation = payload
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(Recommendation::parse);
    let confidence = payload
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0));
    let estimated_return = payload.get("estimated_return").and_then(Value::as_f64);
    let risk_notes = payload
        .get("risk_notes")
        .and_then(Value::as_str)
        .map(str::to_string);
    let sources = payload
        .get("sources")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    AnalysisResult {
        symbol: symbol.to_string(),
        status: ResultStatus::Accepted,
        recommendation,
        estimated_return,
        confidence,
        risk_notes,
        sources,
        error: None,
        missing_fields: Vec::new(),
        attempts,
    }
}
