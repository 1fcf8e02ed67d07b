// Detector stages
//
// A detector is a pure function over one file: it sees the raw content plus
// the shared `FileScan` view and yields issues already assigned to a report
// bucket. Detectors are registered in a fixed order; the report preserves
// that order within each bucket.

pub mod ai;
pub mod async_rules;
pub mod auth;
pub mod java;
pub mod linter;
pub mod patterns;
pub mod python;
pub mod semantic;

use codesift_core::domain::{Bucket, Issue, IssueCategory, Severity};

use crate::language::Language;
use crate::scanner::FileScan;

/// The file under analysis.
pub struct SourceFile<'a> {
    pub name: &'a str,
    pub language: Language,
    pub content: &'a str,
}

/// Synchronous detector stage.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn scan(&self, file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)>;
}

/// Build an issue that routes through the fixed category-to-bucket mapping.
pub(crate) fn categorized_issue(
    line: u32,
    category: IssueCategory,
    severity: Severity,
    rule: &str,
    message: impl Into<String>,
    suggestion: impl Into<String>,
) -> (Bucket, Issue) {
    (
        category.bucket(),
        Issue {
            line,
            column: None,
            message: message.into(),
            severity,
            rule: rule.to_string(),
            suggestion: suggestion.into(),
            category: Some(category),
        },
    )
}

/// Build an issue placed directly in a bucket (pattern stages).
pub(crate) fn bucketed_issue(
    line: u32,
    bucket: Bucket,
    severity: Severity,
    rule: &str,
    message: impl Into<String>,
    suggestion: impl Into<String>,
) -> (Bucket, Issue) {
    (
        bucket,
        Issue {
            line,
            column: None,
            message: message.into(),
            severity,
            rule: rule.to_string(),
            suggestion: suggestion.into(),
            category: None,
        },
    )
}
