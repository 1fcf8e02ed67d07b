// Codesift Analyzer - multi-stage static analysis pipeline
//
// Stage order is fixed and observable through issue ordering: generic
// patterns, language-specific detectors, async rules, semantic rules, auth
// rules, the external linter adapter, and finally the AI reviewer. The AI
// stage is the only async detector and can never fail the analysis.

pub mod detectors;
pub mod language;
pub mod report;
pub mod scanner;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use codesift_core::domain::Report;
use codesift_core::port::analyzer::{AnalysisError, Analyzer};

use detectors::ai::{AiConfig, AiReviewer};
use detectors::async_rules::{has_async_markers, AsyncDetector};
use detectors::auth::{has_auth_markers, AuthDetector};
use detectors::java::JavaDetector;
use detectors::linter::{
    map_diagnostics, CommandLintEngine, DisabledLintEngine, LintEngine, LinterConfig,
};
use detectors::patterns::PatternDetector;
use detectors::python::PythonDetector;
use detectors::semantic::SemanticDetector;
use detectors::{Detector, SourceFile};
use language::Language;
use scanner::FileScan;

/// Testing escape hatch: with `allow_force_fail` set, this file name makes
/// the analyzer fail deterministically.
pub const FORCE_FAIL_FILE: &str = "force_fail.js";

#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub allow_force_fail: bool,
    pub ai: AiConfig,
    pub linter: LinterConfig,
}

pub struct CodeAnalyzer {
    config: AnalyzerConfig,
    ai: AiReviewer,
    linter: Arc<dyn LintEngine>,
}

impl CodeAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let linter: Arc<dyn LintEngine> = match &config.linter.command {
            Some(command) => Arc::new(CommandLintEngine::new(
                command.clone(),
                config.linter.timeout,
            )),
            None => Arc::new(DisabledLintEngine),
        };
        Self::with_lint_engine(config, linter)
    }

    /// Inject a lint engine (tests swap in a stub).
    pub fn with_lint_engine(config: AnalyzerConfig, linter: Arc<dyn LintEngine>) -> Self {
        let ai = AiReviewer::new(config.ai.clone());
        Self { config, ai, linter }
    }
}

#[async_trait]
impl Analyzer for CodeAnalyzer {
    async fn analyze(
        &self,
        content: &str,
        file_name: &str,
    ) -> std::result::Result<Report, AnalysisError> {
        let started = Instant::now();

        if self.config.allow_force_fail && file_name == FORCE_FAIL_FILE {
            return Err(AnalysisError::Forced(file_name.to_string()));
        }

        let language = Language::detect(file_name, content);
        let file = SourceFile {
            name: file_name,
            language,
            content,
        };
        let scan = FileScan::build(content);
        debug!(file_name = %file_name, language = %language.as_str(), "Analysis started");

        let mut issues = PatternDetector.scan(&file, &scan);

        match language {
            Language::Java => issues.extend(JavaDetector.scan(&file, &scan)),
            Language::Python => issues.extend(PythonDetector.scan(&file, &scan)),
            _ => {}
        }

        if language.is_js_like() {
            if has_async_markers(content) {
                issues.extend(AsyncDetector.scan(&file, &scan));
            }
            issues.extend(SemanticDetector.scan(&file, &scan));
            if has_auth_markers(content) {
                issues.extend(AuthDetector.scan(&file, &scan));
            }
            // Linter failures (unlike AI failures) fail the analysis.
            let diagnostics = self.linter.run(content, file_name).await?;
            issues.extend(map_diagnostics(diagnostics));
        }

        let line_count = FileScan::line_count(content);
        let ai_suggestions = if self.ai.gate(line_count) {
            self.ai.review(content, file_name, language).await
        } else {
            Vec::new()
        };

        Ok(report::assemble(
            file_name,
            issues,
            ai_suggestions,
            line_count,
            started.elapsed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detectors::linter::LintDiagnostic;

    fn analyzer() -> CodeAnalyzer {
        CodeAnalyzer::new(AnalyzerConfig::default())
    }

    #[tokio::test]
    async fn eval_lands_in_security_bucket() {
        let report = analyzer().analyze("eval(input)\n", "a.js").await.unwrap();
        let hit = report
            .security
            .iter()
            .find(|i| i.rule == "no-eval")
            .expect("no-eval in security bucket");
        assert_eq!(hit.line, 1);
        assert!(report.metrics.issues_found >= 1);
        assert_eq!(report.metrics.lines_analyzed, 2);
    }

    #[tokio::test]
    async fn force_fail_requires_flag() {
        let gated = CodeAnalyzer::new(AnalyzerConfig {
            allow_force_fail: true,
            ..AnalyzerConfig::default()
        });
        let err = gated.analyze("x", FORCE_FAIL_FILE).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Forced(_)));

        // Without the flag the file analyzes normally.
        let report = analyzer().analyze("x", FORCE_FAIL_FILE).await.unwrap();
        assert_eq!(report.file_name, FORCE_FAIL_FILE);
    }

    #[tokio::test]
    async fn short_file_skips_ai_and_still_reports() {
        let enabled = CodeAnalyzer::new(AnalyzerConfig {
            ai: AiConfig {
                enabled: true,
                min_lines: 5,
                ..AiConfig::default()
            },
            ..AnalyzerConfig::default()
        });
        // 3 lines < min_lines: the AI stage is skipped entirely (no request
        // is attempted), the rest of the pipeline runs.
        let report = enabled
            .analyze("const a = 1;\nconst b = 2;\nexport { a, b };", "a.js")
            .await
            .unwrap();
        assert!(report.ai_suggestions.is_empty());
        assert_eq!(report.metrics.lines_analyzed, 3);
    }

    #[tokio::test]
    async fn ai_failure_never_fails_the_analysis() {
        let broken_provider = CodeAnalyzer::new(AnalyzerConfig {
            ai: AiConfig {
                enabled: true,
                provider_url: "http://127.0.0.1:1/unreachable".to_string(),
                min_lines: 1,
                request_timeout: std::time::Duration::from_millis(200),
                ..AiConfig::default()
            },
            ..AnalyzerConfig::default()
        });
        let report = broken_provider
            .analyze("const a = 1;\nconst b = a;\n", "a.js")
            .await
            .unwrap();
        assert!(report.ai_suggestions.is_empty());
    }

    #[tokio::test]
    async fn java_routing_runs_java_detectors_only() {
        let content = "Process p = Runtime.getRuntime().exec(cmd);\n";
        let report = analyzer().analyze(content, "Widget.java").await.unwrap();
        assert!(report.security.iter().any(|i| i.rule == "java-runtime-exec"));
        // No async/semantic/auth issues for java files.
        assert!(report
            .security
            .iter()
            .chain(report.performance.iter())
            .chain(report.style.iter())
            .all(|i| i.category.is_none()));
    }

    #[tokio::test]
    async fn unknown_language_runs_generic_patterns_only() {
        let content = "eval(x)\nwhile (true) {\n}\n";
        let report = analyzer().analyze(content, "script.go").await.unwrap();
        assert!(report.security.iter().any(|i| i.rule == "no-eval"));
        assert!(report
            .performance
            .iter()
            .any(|i| i.rule == "infinite-loop"));
    }

    struct StubLinter(Vec<LintDiagnostic>);

    #[async_trait]
    impl LintEngine for StubLinter {
        async fn run(
            &self,
            _content: &str,
            _file_name: &str,
        ) -> std::result::Result<Vec<LintDiagnostic>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLinter;

    #[async_trait]
    impl LintEngine for FailingLinter {
        async fn run(
            &self,
            _content: &str,
            _file_name: &str,
        ) -> std::result::Result<Vec<LintDiagnostic>, AnalysisError> {
            Err(AnalysisError::Linter("engine crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn linter_diagnostics_join_the_report() {
        let analyzer = CodeAnalyzer::with_lint_engine(
            AnalyzerConfig::default(),
            Arc::new(StubLinter(vec![LintDiagnostic {
                rule_id: "no-eval".to_string(),
                line: 1,
                column: Some(1),
                message: "eval is harmful".to_string(),
                error: true,
            }])),
        );
        let report = analyzer.analyze("const a = 1;\n", "a.js").await.unwrap();
        assert!(report
            .security
            .iter()
            .any(|i| i.rule == "no-eval" && i.message == "eval is harmful"));
    }

    #[tokio::test]
    async fn linter_failure_fails_the_analysis() {
        let analyzer =
            CodeAnalyzer::with_lint_engine(AnalyzerConfig::default(), Arc::new(FailingLinter));
        let err = analyzer.analyze("const a = 1;\n", "a.js").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Linter(_)));
    }

    #[tokio::test]
    async fn linter_skipped_for_non_js_files() {
        let analyzer =
            CodeAnalyzer::with_lint_engine(AnalyzerConfig::default(), Arc::new(FailingLinter));
        // Python routing never reaches the failing linter.
        let report = analyzer.analyze("import os\n", "app.py").await.unwrap();
        assert_eq!(report.file_name, "app.py");
    }

    #[tokio::test]
    async fn stage_order_is_observable_in_buckets() {
        // Pattern issue (no-eval) precedes a semantic issue routed to the
        // same bucket.
        let content = "\
eval(payload);
const cache = new Map();
app.get('/x', handler);
let hits = 0;
";
        let report = analyzer().analyze(content, "a.js").await.unwrap();
        let rules: Vec<&str> = report.security.iter().map(|i| i.rule.as_str()).collect();
        let eval_pos = rules.iter().position(|r| *r == "no-eval").expect("no-eval");
        let global_pos = rules
            .iter()
            .position(|r| *r == "global-state-in-handler")
            .expect("semantic rule");
        assert!(eval_pos < global_pos);
    }
}
