// Report assembly and quality scoring

use std::time::Duration;

use codesift_core::domain::{
    AiSuggestion, Bucket, Grade, Issue, Report, ReportMetrics, Severity,
};

/// Per-issue deductions from the starting score of 100, by bucket and
/// severity. Style issues deduct a flat 0.5.
fn deduction(bucket: Bucket, severity: Severity) -> f64 {
    match bucket {
        Bucket::Security => match severity {
            Severity::Critical => 15.0,
            Severity::High => 10.0,
            Severity::Medium => 5.0,
            Severity::Low => 2.0,
        },
        Bucket::Performance => match severity {
            Severity::Critical => 10.0,
            Severity::High => 7.0,
            Severity::Medium => 4.0,
            Severity::Low => 1.0,
        },
        Bucket::Style => 0.5,
    }
}

fn ai_deduction(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 8.0,
        Severity::High => 5.0,
        Severity::Medium => 3.0,
        Severity::Low => 1.0,
    }
}

/// Deterministic weighted score, clamped to [0, 100].
pub fn quality_score(
    security: &[Issue],
    performance: &[Issue],
    style: &[Issue],
    ai: &[AiSuggestion],
) -> f64 {
    let mut score = 100.0;
    for issue in security {
        score -= deduction(Bucket::Security, issue.severity);
    }
    for issue in performance {
        score -= deduction(Bucket::Performance, issue.severity);
    }
    for issue in style {
        score -= deduction(Bucket::Style, issue.severity);
    }
    for suggestion in ai {
        score -= ai_deduction(suggestion.severity);
    }
    score.clamp(0.0, 100.0)
}

fn review_time_text(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{} ms", millis)
    } else {
        format!("{:.1} s", elapsed.as_secs_f64())
    }
}

/// Assemble the final report. `issues` arrive in detector-stage order and
/// that order is preserved within each bucket.
pub fn assemble(
    file_name: &str,
    issues: Vec<(Bucket, Issue)>,
    ai_suggestions: Vec<AiSuggestion>,
    lines_analyzed: u64,
    elapsed: Duration,
) -> Report {
    let mut security = Vec::new();
    let mut performance = Vec::new();
    let mut style = Vec::new();
    for (bucket, issue) in issues {
        match bucket {
            Bucket::Security => security.push(issue),
            Bucket::Performance => performance.push(issue),
            Bucket::Style => style.push(issue),
        }
    }

    let score = quality_score(&security, &performance, &style, &ai_suggestions);
    let issues_found =
        (security.len() + performance.len() + style.len() + ai_suggestions.len()) as u64;

    Report {
        file_name: file_name.to_string(),
        security,
        performance,
        style,
        ai_suggestions,
        metrics: ReportMetrics {
            lines_analyzed,
            issues_found,
            processing_time_ms: elapsed.as_millis() as i64,
            review_time_text: review_time_text(elapsed),
            cache_hit: false,
        },
        quality_score: score,
        grade: Grade::from_score(score),
    }
}
