// Review Report Domain Model

use serde::{Deserialize, Serialize};

/// Issue severity, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// Fine-grained issue category carried by async/semantic/auth detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    Security,
    Performance,
    Concurrency,
    MemoryLeak,
    Reliability,
    Observability,
    Testability,
    Maintainability,
    Design,
    Style,
}

/// One of the three report sections an issue lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Security,
    Performance,
    Style,
}

impl IssueCategory {
    /// Fixed category-to-bucket routing. Concurrency and reliability issues
    /// count as security findings; leak/observability/testability issues as
    /// performance findings; design issues as style findings.
    pub fn bucket(self) -> Bucket {
        match self {
            IssueCategory::Security => Bucket::Security,
            IssueCategory::Concurrency => Bucket::Security,
            IssueCategory::Reliability => Bucket::Security,
            IssueCategory::Performance => Bucket::Performance,
            IssueCategory::MemoryLeak => Bucket::Performance,
            IssueCategory::Observability => Bucket::Performance,
            IssueCategory::Testability => Bucket::Performance,
            IssueCategory::Maintainability => Bucket::Style,
            IssueCategory::Design => Bucket::Style,
            IssueCategory::Style => Bucket::Style,
        }
    }
}

/// A single finding at a source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// 1-based line number.
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    pub severity: Severity,
    /// Stable rule identifier, e.g. `no-eval`.
    pub rule: String,
    /// Remediation hint shown to the user.
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<IssueCategory>,
}

/// Category set for AI-produced suggestions (narrower than `IssueCategory`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiCategory {
    Security,
    Performance,
    Logic,
    Style,
    Reliability,
}

impl AiCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "security" => Some(AiCategory::Security),
            "performance" => Some(AiCategory::Performance),
            "logic" => Some(AiCategory::Logic),
            "style" => Some(AiCategory::Style),
            "reliability" => Some(AiCategory::Reliability),
            _ => None,
        }
    }
}

/// A validated suggestion returned by the AI reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub line: u32,
    pub severity: Severity,
    pub category: AiCategory,
    pub title: String,
    pub explanation: String,
    pub suggested_fix: String,
}

/// Quality grade derived from the weighted issue score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// `A ≥ 90, B ≥ 80, C ≥ 70, D ≥ 60, else F`.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

/// Aggregate metrics for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub lines_analyzed: u64,
    pub issues_found: u64,
    pub processing_time_ms: i64,
    pub review_time_text: String,
    pub cache_hit: bool,
}

/// The structured output of the Analyzer for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub file_name: String,
    pub security: Vec<Issue>,
    pub performance: Vec<Issue>,
    pub style: Vec<Issue>,
    pub ai_suggestions: Vec<AiSuggestion>,
    pub metrics: ReportMetrics,
    pub quality_score: f64,
    pub grade: Grade,
}

impl Report {
    /// Total findings across the three buckets plus AI suggestions.
    pub fn issue_count(&self) -> u64 {
        (self.security.len() + self.performance.len() + self.style.len() + self.ai_suggestions.len())
            as u64
    }

    pub fn bucket(&self, bucket: Bucket) -> &[Issue] {
        match bucket {
            Bucket::Security => &self.security,
            Bucket::Performance => &self.performance,
            Bucket::Style => &self.style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_routing_is_fixed() {
        assert_eq!(IssueCategory::Concurrency.bucket(), Bucket::Security);
        assert_eq!(IssueCategory::Reliability.bucket(), Bucket::Security);
        assert_eq!(IssueCategory::Security.bucket(), Bucket::Security);
        assert_eq!(IssueCategory::MemoryLeak.bucket(), Bucket::Performance);
        assert_eq!(IssueCategory::Observability.bucket(), Bucket::Performance);
        assert_eq!(IssueCategory::Testability.bucket(), Bucket::Performance);
        assert_eq!(IssueCategory::Performance.bucket(), Bucket::Performance);
        assert_eq!(IssueCategory::Design.bucket(), Bucket::Style);
        assert_eq!(IssueCategory::Maintainability.bucket(), Bucket::Style);
        assert_eq!(IssueCategory::Style.bucket(), Bucket::Style);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(100.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.9), Grade::B);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.9), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn severity_round_trips_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(Severity::parse("high"), Some(Severity::High));
        assert_eq!(Severity::parse("HIGH"), None);
    }
}
