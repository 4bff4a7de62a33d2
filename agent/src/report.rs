use crate::types::{AnalysisReport, ResultStatus};

/// Render the full report as plain text for stdout or file output
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "HOLDINGS ANALYSIS REPORT\n\
        Run: {run} | Generated: {ts}\n\
        {line}\n",
        run = report.run_id,
        ts = report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        line = "=".repeat(72),
    ));

    out.push_str(&format!(
        "{:<14} {:<18} {:<8} {:>8} {:>10}\n{}\n",
        "SYMBOL",
        "STATUS",
        "ACTION",
        "CONF",
        "EST RET",
        "-".repeat(72),
    ));

    for r in &report.results {
        let action = r
            .recommendation
            .map(|rec| rec.to_string())
            .unwrap_or_else(|| "-".to_string());
        let conf = r
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let est = r
            .estimated_return
            .map(|e| format!("{e:+.1}%"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<14} {:<18} {:<8} {:>8} {:>10}\n",
            r.symbol,
            r.status.to_string(),
            action,
            conf,
            est,
        ));
        if let Some(err) = &r.error {
            out.push_str(&format!("  error: {err}\n"));
            if !r.missing_fields.is_empty() {
                out.push_str(&format!("  fields: {}\n", r.missing_fields.join(", ")));
            }
        }
    }

    out.push_str(&format!("{}\n", "-".repeat(72)));
    if !report.sector_summary.is_empty() {
        out.push_str("Sector summary (accepted holdings):\n");
        for bucket in &report.sector_summary {
            out.push_str(&format!(
                "  {:<20} {} holdings, value {}\n",
                bucket.sector, bucket.holdings, bucket.value
            ));
        }
    }
    out.push_str(&format!(
        "Overall confidence: {conf:.2} | Accepted: {ok}/{total} | Follow-up needed: {fu}\n",
        conf = report.overall_confidence,
        ok = report.accepted_count,
        total = report.results.len(),
        fu = if report.needs_follow_up { "YES" } else { "no" },
    ));

    out
}

/// One-line summary for the outbound notification channel
pub fn notification_summary(report: &AnalysisReport) -> String {
    let exhausted = report
        .results
        .iter()
        .filter(|r| r.status == ResultStatus::Exhausted)
        .count();
    let mut msg = format!(
        "Holdings analysis: {ok}/{total} analyzed, overall confidence {conf:.2}",
        ok = report.accepted_count,
        total = report.results.len(),
        conf = report.overall_confidence,
    );
    if exhausted > 0 {
        msg.push_str(&format!(", {exhausted} could not be validated"));
    }
    if report.needs_follow_up {
        msg.push_str(". Follow-up recommended.");
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisResult, Recommendation, SectorBucket};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn report() -> AnalysisReport {
        AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            results: vec![
                AnalysisResult {
                    symbol: "INFY".to_string(),
                    status: ResultStatus::Accepted,
                    recommendation: Some(Recommendation::Buy),
                    estimated_return: Some(12.5),
                    confidence: Some(0.8),
                    risk_notes: Some("ok".to_string()),
                    sources: vec!["news".to_string()],
                    error: None,
                    missing_fields: Vec::new(),
                    attempts: 1,
                },
                AnalysisResult::failed(
                    "TCS",
                    ResultStatus::Exhausted,
                    "validation did not succeed within the retry budget",
                    vec!["entire payload".to_string()],
                    3,
                ),
            ],
            overall_confidence: 0.8,
            sector_summary: vec![SectorBucket {
                sector: "IT".to_string(),
                holdings: 1,
                value: dec!(15005),
            }],
            needs_follow_up: true,
            accepted_count: 1,
            failed_count: 1,
        }
    }

    #[test]
    fn text_report_lists_every_entity() {
        let text = render_text(&report());
        assert!(text.contains("INFY"));
        assert!(text.contains("BUY"));
        assert!(text.contains("TCS"));
        assert!(text.contains("EXHAUSTED"));
        assert!(text.contains("fields: entire payload"));
        assert!(text.contains("Follow-up needed: YES"));
    }

    #[test]
    fn notification_is_compact() {
        let msg = notification_summary(&report());
        assert!(msg.contains("1/2 analyzed"));
        assert!(msg.contains("1 could not be validated"));
        assert!(msg.contains("Follow-up recommended"));
        assert!(msg.len() < 200);
    }
}
