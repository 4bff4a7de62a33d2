use crate::types::{AnalysisReport, AnalysisResult, Holding, SectorBucket};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Bucket for accepted holdings whose sector is unknown
pub const UNSPECIFIED_SECTOR: &str = "UNSPECIFIED";

/// Invariant violations while merging results. These indicate a programming
/// error upstream, not a recoverable condition.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("duplicate entity slot for symbol {0}")]
    DuplicateSlot(String),
    #[error("result count {results} does not match holdings count {holdings}")]
    CountMismatch { results: usize, holdings: usize },
    #[error("slot {index} holds {found}, expected {expected}")]
    SlotMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

/// Merge per-holding outcomes into one portfolio-level report.
/// Failed entities stay in the report with their diagnostics intact so a
/// caller can re-drive just those entities later.
pub fn combine(
    holdings: &[Holding],
    results: Vec<AnalysisResult>,
    confidence_threshold: f64,
) -> Result<AnalysisReport, AggregationError> {
    if results.len() != holdings.len() {
        return Err(AggregationError::CountMismatch {
            results: results.len(),
            holdings: holdings.len(),
        });
    }

    let mut seen = HashSet::new();
    for (i, (holding, result)) in holdings.iter().zip(&results).enumerate() {
        if result.symbol != holding.symbol {
            return Err(AggregationError::SlotMismatch {
                index: i,
                expected: holding.symbol.clone(),
                found: result.symbol.clone(),
            });
        }
        if !seen.insert(result.symbol.clone()) {
            return Err(AggregationError::DuplicateSlot(result.symbol.clone()));
        }
    }

    let accepted: Vec<(&Holding, &AnalysisResult)> = holdings
        .iter()
        .zip(&results)
        .filter(|(_, r)| r.is_accepted())
        .collect();

    let overall_confidence = if accepted.is_empty() {
        0.0
    } else {
        let sum: f64 = accepted
            .iter()
            .map(|(_, r)| r.confidence.unwrap_or(0.0))
            .sum();
        sum / accepted.len() as f64
    };

    // Sector comes from the holding, not from the LLM
    let mut buckets: HashMap<String, (usize, Decimal)> = HashMap::new();
    for (holding, _) in &accepted {
        let sector = holding
            .sector
            .clone()
            .unwrap_or_else(|| UNSPECIFIED_SECTOR.to_string());
        let entry = buckets.entry(sector).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += holding.value;
    }
    let mut sector_summary: Vec<SectorBucket> = buckets
        .into_iter()
        .map(|(sector, (holdings, value))| SectorBucket {
            sector,
            holdings,
            value,
        })
        .collect();
    sector_summary.sort_by(|a, b| b.value.cmp(&a.value).then(a.sector.cmp(&b.sector)));

    let accepted_count = accepted.len();
    let failed_count = results.len() - accepted_count;
    let needs_follow_up = failed_count > 0 || overall_confidence < confidence_threshold;

    Ok(AnalysisReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        results,
        overall_confidence,
        sector_summary,
        needs_follow_up,
        accepted_count,
        failed_count,
    })
}

/// Report wrapper for a whole-portfolio run: one record covering every
/// holding. Sector summary still comes from the holdings themselves.
pub fn single(
    holdings: &[Holding],
    result: AnalysisResult,
    confidence_threshold: f64,
) -> AnalysisReport {
    let accepted = result.is_accepted();
    let overall_confidence = if accepted {
        result.confidence.unwrap_or(0.0)
    } else {
        0.0
    };

    let mut buckets: HashMap<String, (usize, Decimal)> = HashMap::new();
    if accepted {
        for holding in holdings {
            let sector = holding
                .sector
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_SECTOR.to_string());
            let entry = buckets.entry(sector).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += holding.value;
        }
    }
    let mut sector_summary: Vec<SectorBucket> = buckets
        .into_iter()
        .map(|(sector, (holdings, value))| SectorBucket {
            sector,
            holdings,
            value,
        })
        .collect();
    sector_summary.sort_by(|a, b| b.value.cmp(&a.value).then(a.sector.cmp(&b.sector)));

    AnalysisReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        overall_confidence,
        sector_summary,
        needs_follow_up: !accepted || overall_confidence < confidence_threshold,
        accepted_count: usize::from(accepted),
        failed_count: usize::from(!accepted),
        results: vec![result],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultStatus;
    use rust_decimal_macros::dec;

    fn holding(symbol: &str, sector: Option<&str>, value: Decimal) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            company_name: None,
            quantity: dec!(1),
            price: value,
            value,
            sector: sector.map(str::to_string),
            exchange: None,
            yesterday_price: None,
            variation_percent: None,
        }
    }

    fn accepted(symbol: &str, confidence: f64) -> AnalysisResult {
        AnalysisResult {
            symbol: symbol.to_string(),
            status: ResultStatus::Accepted,
            recommendation: Some(crate::types::Recommendation::Retain),
            estimated_return: None,
            confidence: Some(confidence),
            risk_notes: Some("ok".to_string()),
            sources: vec!["news".to_string()],
            error: None,
            missing_fields: Vec::new(),
            attempts: 1,
        }
    }

    fn exhausted(symbol: &str) -> AnalysisResult {
        AnalysisResult::failed(
            symbol,
            ResultStatus::Exhausted,
            "validation did not succeed within the retry budget",
            vec!["confidence".to_string()],
            3,
        )
    }

    #[test]
    fn mean_confidence_over_accepted_only() {
        let holdings = vec![
            holding("A", Some("IT"), dec!(100)),
            holding("B", Some("IT"), dec!(200)),
            holding("C", Some("Banking"), dec!(300)),
        ];
        let results = vec![accepted("A", 0.8), exhausted("B"), accepted("C", 0.6)];

        let report = combine(&holdings, results, 0.5).unwrap();
        assert!((report.overall_confidence - 0.7).abs() < 1e-9);
        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.failed_count, 1);
        // one exhausted entity forces follow-up even above the threshold
        assert!(report.needs_follow_up);
        // failed entity keeps its diagnostics
        assert_eq!(report.results[1].missing_fields, vec!["confidence"]);
    }

    #[test]
    fn zero_accepted_is_flagged() {
        let holdings = vec![holding("A", Some("IT"), dec!(100))];
        let results = vec![exhausted("A")];

        let report = combine(&holdings, results, 0.5).unwrap();
        assert_eq!(report.overall_confidence, 0.0);
        assert!(report.needs_follow_up);
        assert!(report.sector_summary.is_empty());
    }

    #[test]
    fn low_mean_confidence_triggers_follow_up() {
        let holdings = vec![holding("A", Some("IT"), dec!(100))];
        let report = combine(&holdings, vec![accepted("A", 0.3)], 0.5).unwrap();
        assert!(report.needs_follow_up);

        let holdings = vec![holding("A", Some("IT"), dec!(100))];
        let report = combine(&holdings, vec![accepted("A", 0.9)], 0.5).unwrap();
        assert!(!report.needs_follow_up);
    }

    #[test]
    fn sectors_sum_value_with_unspecified_bucket() {
        let holdings = vec![
            holding("A", Some("IT"), dec!(100)),
            holding("B", Some("IT"), dec!(200)),
            holding("C", None, dec!(50)),
        ];
        let results = vec![accepted("A", 0.8), accepted("B", 0.8), accepted("C", 0.8)];

        let report = combine(&holdings, results, 0.5).unwrap();
        assert_eq!(report.sector_summary.len(), 2);
        assert_eq!(report.sector_summary[0].sector, "IT");
        assert_eq!(report.sector_summary[0].holdings, 2);
        assert_eq!(report.sector_summary[0].value, dec!(300));
        assert_eq!(report.sector_summary[1].sector, UNSPECIFIED_SECTOR);
        assert_eq!(report.sector_summary[1].value, dec!(50));
    }

    #[test]
    fn duplicate_slot_is_a_fault() {
        let holdings = vec![
            holding("A", None, dec!(100)),
            holding("A", None, dec!(100)),
        ];
        let results = vec![accepted("A", 0.8), accepted("A", 0.8)];
        let err = combine(&holdings, results, 0.5).unwrap_err();
        assert!(matches!(err, AggregationError::DuplicateSlot(s) if s == "A"));
    }

    #[test]
    fn count_mismatch_is_a_fault() {
        let holdings = vec![holding("A", None, dec!(100))];
        let err = combine(&holdings, vec![], 0.5).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::CountMismatch { results: 0, holdings: 1 }
        ));
    }

    #[test]
    fn single_report_covers_all_holdings() {
        let holdings = vec![
            holding("A", Some("IT"), dec!(100)),
            holding("B", None, dec!(50)),
        ];
        let report = single(&holdings, accepted("PORTFOLIO", 0.75), 0.5);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.overall_confidence, 0.75);
        assert!(!report.needs_follow_up);
        assert_eq!(report.sector_summary.len(), 2);
    }
}
