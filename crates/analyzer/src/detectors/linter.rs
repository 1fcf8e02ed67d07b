// External linter adapter (JS/TS). The engine itself is opaque: a
// configured command that reads the file on stdin and prints a JSON array
// of diagnostics. The adapter maps diagnostics into report issues by
// rule-id, with severity `high` at the engine's error level and `medium`
// otherwise.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use codesift_core::domain::{Bucket, Issue, Severity};
use codesift_core::port::analyzer::AnalysisError;

/// Fixed rule-set handed to the engine on every run.
pub const LINT_RULESET: &[&str] = &[
    "no-eval",
    "no-implied-eval",
    "no-new-func",
    "detect-child-process",
    "detect-non-literal-fs-filename",
    "detect-unsafe-regex",
    "no-async-promise-executor",
    "require-atomic-updates",
    "no-await-in-loop",
    "eqeqeq",
    "prefer-const",
    "no-var",
    "complexity",
];

const SECURITY_RULES: &[&str] = &[
    "no-eval",
    "no-implied-eval",
    "no-new-func",
    "detect-child-process",
    "detect-non-literal-fs-filename",
    "detect-unsafe-regex",
    "no-async-promise-executor",
    "require-atomic-updates",
];

const PERFORMANCE_RULES: &[&str] = &["no-await-in-loop", "complexity"];

#[derive(Debug, Clone)]
pub struct LinterConfig {
    /// Engine command; None disables the stage.
    pub command: Option<String>,
    pub timeout: Duration,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout: Duration::from_secs(20),
        }
    }
}

/// One diagnostic as emitted by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct LintDiagnostic {
    pub rule_id: String,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
    pub message: String,
    /// True when the engine reports the rule at error level.
    #[serde(default)]
    pub error: bool,
}

/// Opaque lint engine boundary.
#[async_trait]
pub trait LintEngine: Send + Sync {
    async fn run(
        &self,
        content: &str,
        file_name: &str,
    ) -> std::result::Result<Vec<LintDiagnostic>, AnalysisError>;
}

/// Disabled engine: the stage contributes nothing.
pub struct DisabledLintEngine;

#[async_trait]
impl LintEngine for DisabledLintEngine {
    async fn run(
        &self,
        _content: &str,
        _file_name: &str,
    ) -> std::result::Result<Vec<LintDiagnostic>, AnalysisError> {
        Ok(Vec::new())
    }
}

/// Runs the configured engine command with the file on stdin and the fixed
/// rule-set as arguments.
pub struct CommandLintEngine {
    command: String,
    timeout: Duration,
}

impl CommandLintEngine {
    pub fn new(command: String, run_timeout: Duration) -> Self {
        Self {
            command,
            timeout: run_timeout,
        }
    }
}

#[async_trait]
impl LintEngine for CommandLintEngine {
    async fn run(
        &self,
        content: &str,
        file_name: &str,
    ) -> std::result::Result<Vec<LintDiagnostic>, AnalysisError> {
        let mut child = Command::new(&self.command)
            .arg("--stdin-filename")
            .arg(file_name)
            .arg("--rules")
            .arg(LINT_RULESET.join(","))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnalysisError::Linter(format!("spawn {}: {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .await
                .map_err(|e| AnalysisError::Linter(format!("write stdin: {}", e)))?;
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AnalysisError::Linter(format!(
                    "engine timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| AnalysisError::Linter(format!("engine i/o: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::Linter(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice::<Vec<LintDiagnostic>>(&output.stdout)
            .map_err(|e| AnalysisError::Linter(format!("engine output is not valid JSON: {}", e)))
    }
}

/// Rule-id → bucket mapping (part of the adapter contract).
pub fn bucket_for_rule(rule_id: &str) -> Bucket {
    if SECURITY_RULES.contains(&rule_id) {
        Bucket::Security
    } else if PERFORMANCE_RULES.contains(&rule_id) {
        Bucket::Performance
    } else {
        Bucket::Style
    }
}

/// Map engine diagnostics into report issues.
pub fn map_diagnostics(diagnostics: Vec<LintDiagnostic>) -> Vec<(Bucket, Issue)> {
    diagnostics
        .into_iter()
        .map(|d| {
            let bucket = bucket_for_rule(&d.rule_id);
            let severity = if d.error {
                Severity::High
            } else {
                Severity::Medium
            };
            debug!(rule = %d.rule_id, line = %d.line, "Linter diagnostic mapped");
            (
                bucket,
                Issue {
                    line: d.line.max(1),
                    column: d.column,
                    message: d.message,
                    severity,
                    rule: d.rule_id,
                    suggestion: "See the linter rule documentation".to_string(),
                    category: None,
                },
            )
        })
        .collect()
}
