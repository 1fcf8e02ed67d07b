// Analyzer Port (Interface)
// Abstraction over the multi-stage static analysis pipeline

use crate::domain::Report;
use async_trait::async_trait;
use thiserror::Error;

/// Analysis failures, by stage.
///
/// `Ai` never escapes the analyzer (the AI stage degrades to an empty
/// suggestion list); the variant exists for logging and tests. The other
/// kinds propagate to the worker and drive redelivery/DLQ routing.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("pattern stage failed: {0}")]
    Pattern(String),

    #[error("linter failed: {0}")]
    Linter(String),

    #[error("ai review failed: {0}")]
    Ai(String),

    #[error("forced failure for {0}")]
    Forced(String),
}

/// Multi-stage analyzer: pure composition of detectors over a single file.
///
/// The only internal asynchrony is the AI call, which runs under its own
/// bounded timeout and must not fail the overall analysis.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        content: &str,
        file_name: &str,
    ) -> std::result::Result<Report, AnalysisError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{Grade, ReportMetrics};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock analyzer behavior
    pub enum MockBehavior {
        /// Always succeed with an empty report
        Success,
        /// Always fail with the given message
        Fail(String),
        /// Fail the first N calls, then succeed
        FailTimes(usize, String),
    }

    /// Mock Analyzer for worker/pipeline tests
    pub struct MockAnalyzer {
        behavior: Mutex<MockBehavior>,
        call_count: AtomicUsize,
    }

    impl MockAnalyzer {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_fail_times(times: usize, message: impl Into<String>) -> Self {
            Self::new(MockBehavior::FailTimes(times, message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn empty_report(file_name: &str) -> Report {
            Report {
                file_name: file_name.to_string(),
                security: vec![],
                performance: vec![],
                style: vec![],
                ai_suggestions: vec![],
                metrics: ReportMetrics {
                    lines_analyzed: 1,
                    issues_found: 0,
                    processing_time_ms: 0,
                    review_time_text: "0 ms".to_string(),
                    cache_hit: false,
                },
                quality_score: 100.0,
                grade: Grade::A,
            }
        }
    }

    #[async_trait]
    impl Analyzer for MockAnalyzer {
        async fn analyze(
            &self,
            _content: &str,
            file_name: &str,
        ) -> std::result::Result<Report, AnalysisError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            let behavior = self.behavior.lock().unwrap();
            match &*behavior {
                MockBehavior::Success => Ok(Self::empty_report(file_name)),
                MockBehavior::Fail(msg) => Err(AnalysisError::Pattern(msg.clone())),
                MockBehavior::FailTimes(times, msg) => {
                    if call < *times {
                        Err(AnalysisError::Pattern(msg.clone()))
                    } else {
                        Ok(Self::empty_report(file_name))
                    }
                }
            }
        }
    }
}
