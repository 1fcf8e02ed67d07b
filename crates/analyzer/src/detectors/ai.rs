// AI reviewer: one bounded request to the configured provider per file.
//
// The returned payload must be JSON with a `suggestions` array; each
// element is validated against the domain schema and invalid ones are
// dropped with a warning. Every failure mode (transport, timeout, bad
// payload) degrades to an empty suggestion list and never fails the
// surrounding analysis.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use codesift_core::domain::{AiCategory, AiSuggestion, Severity};
use codesift_core::port::analyzer::AnalysisError;

use crate::language::Language;

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Files below this line count skip the AI stage.
    pub min_lines: u64,
    /// Files above this line count skip the AI stage.
    pub max_lines: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_url: "http://127.0.0.1:8601/v1/review".to_string(),
            model: "code-review-small".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            min_lines: 5,
            max_lines: 1500,
        }
    }
}

pub struct AiReviewer {
    client: reqwest::Client,
    config: AiConfig,
}

impl AiReviewer {
    pub fn new(config: AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// Whether the AI stage runs for a file of this size.
    pub fn gate(&self, line_count: u64) -> bool {
        self.config.enabled
            && line_count >= self.config.min_lines
            && line_count <= self.config.max_lines
    }

    /// Request suggestions. Infallible by contract: any failure returns an
    /// empty list.
    pub async fn review(
        &self,
        content: &str,
        file_name: &str,
        language: Language,
    ) -> Vec<AiSuggestion> {
        match self.request(content, file_name, language).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(file_name = %file_name, error = %e, "AI review failed, degrading to empty suggestions");
                Vec::new()
            }
        }
    }

    async fn request(
        &self,
        content: &str,
        file_name: &str,
        language: Language,
    ) -> std::result::Result<Vec<AiSuggestion>, AnalysisError> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "file_name": file_name,
            "language": language.as_str(),
            "content": content,
        });

        let mut request = self.client.post(&self.config.provider_url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Ai(format!("request: {}", e)))?;
        if !response.status().is_success() {
            return Err(AnalysisError::Ai(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Ai(format!("payload is not JSON: {}", e)))?;
        let suggestions = body
            .get("suggestions")
            .and_then(Value::as_array)
            .ok_or_else(|| AnalysisError::Ai("payload missing suggestions array".to_string()))?;

        let mut valid = Vec::new();
        for raw in suggestions {
            match validate_suggestion(raw) {
                Some(suggestion) => valid.push(suggestion),
                None => warn!(file_name = %file_name, raw = %raw, "Dropping invalid AI suggestion"),
            }
        }
        debug!(file_name = %file_name, count = %valid.len(), "AI suggestions accepted");
        Ok(valid)
    }
}

/// Structural validation of one suggestion: positive line, enumerated
/// severity/category, non-empty strings. Invalid elements are dropped, not
/// coerced.
pub fn validate_suggestion(raw: &Value) -> Option<AiSuggestion> {
    let line = raw.get("line")?.as_u64()?;
    if line < 1 {
        return None;
    }
    let severity = Severity::parse(raw.get("severity")?.as_str()?)?;
    let category = AiCategory::parse(raw.get("category")?.as_str()?)?;
    let title = non_empty(raw.get("title")?)?;
    let explanation = non_empty(raw.get("explanation")?)?;
    let suggested_fix = non_empty(raw.get("suggested_fix")?)?;
    Some(AiSuggestion {
        line: line as u32,
        severity,
        category,
        title,
        explanation,
        suggested_fix,
    })
}

fn non_empty(value: &Value) -> Option<String> {
    let s = value.as_str()?;
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_raw() -> Value {
        json!({
            "line": 3,
            "severity": "high",
            "category": "logic",
            "title": "Off-by-one in pagination",
            "explanation": "The last page is skipped when total % size == 0.",
            "suggested_fix": "Use Math.ceil(total / size)."
        })
    }

    #[test]
    fn valid_suggestion_passes() {
        let s = validate_suggestion(&valid_raw()).expect("valid");
        assert_eq!(s.line, 3);
        assert_eq!(s.severity, Severity::High);
        assert_eq!(s.category, AiCategory::Logic);
    }

    #[test]
    fn zero_line_is_dropped() {
        let mut raw = valid_raw();
        raw["line"] = json!(0);
        assert!(validate_suggestion(&raw).is_none());
    }

    #[test]
    fn unknown_severity_is_dropped() {
        let mut raw = valid_raw();
        raw["severity"] = json!("catastrophic");
        assert!(validate_suggestion(&raw).is_none());
    }

    #[test]
    fn unknown_category_is_dropped() {
        let mut raw = valid_raw();
        raw["category"] = json!("philosophy");
        assert!(validate_suggestion(&raw).is_none());
    }

    #[test]
    fn empty_strings_are_dropped() {
        let mut raw = valid_raw();
        raw["title"] = json!("   ");
        assert!(validate_suggestion(&raw).is_none());
    }

    #[test]
    fn missing_fields_are_dropped() {
        let mut raw = valid_raw();
        raw.as_object_mut().unwrap().remove("suggested_fix");
        assert!(validate_suggestion(&raw).is_none());
    }

    #[test]
    fn gate_honors_bounds() {
        let reviewer = AiReviewer::new(AiConfig {
            enabled: true,
            min_lines: 5,
            max_lines: 100,
            ..AiConfig::default()
        });
        assert!(!reviewer.gate(4));
        assert!(reviewer.gate(5));
        assert!(reviewer.gate(100));
        assert!(!reviewer.gate(101));
    }

    #[test]
    fn gate_respects_disabled() {
        let reviewer = AiReviewer::new(AiConfig::default());
        assert!(!reviewer.gate(50));
    }

    #[tokio::test]
    async fn unreachable_provider_degrades_to_empty() {
        let reviewer = AiReviewer::new(AiConfig {
            enabled: true,
            provider_url: "http://127.0.0.1:1/unreachable".to_string(),
            request_timeout: Duration::from_millis(200),
            ..AiConfig::default()
        });
        let suggestions = reviewer
            .review("const a = 1;", "a.js", Language::JavaScript)
            .await;
        assert!(suggestions.is_empty());
    }
}
