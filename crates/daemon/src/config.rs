//! Environment configuration, read once at startup and passed into the
//! services at construction.

use std::time::Duration;

use codesift_analyzer::detectors::ai::AiConfig;
use codesift_analyzer::detectors::linter::LinterConfig;
use codesift_analyzer::AnalyzerConfig;
use codesift_core::application::SubmissionConfig;
use codesift_core::port::{CacheConfig, QueueConfig};

const DEFAULT_DB_PATH: &str = "~/.codesift/codesift.db";
const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub http_host: String,
    pub http_port: u16,
    pub workers: usize,
    pub maintenance_interval: Duration,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub submission: SubmissionConfig,
    pub analyzer: AnalyzerConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("CODESIFT_DB_PATH")
            .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

        let queue_defaults = QueueConfig::default();
        let queue = QueueConfig {
            visibility_seconds: env_parse(
                "CODESIFT_VISIBILITY_SECONDS",
                queue_defaults.visibility_seconds,
            ),
            max_receive_count: env_parse(
                "CODESIFT_MAX_RECEIVE_COUNT",
                queue_defaults.max_receive_count,
            ),
            long_poll_seconds: env_parse(
                "CODESIFT_LONG_POLL_SECONDS",
                queue_defaults.long_poll_seconds,
            ),
            retention_seconds: env_parse(
                "CODESIFT_QUEUE_RETENTION_SECONDS",
                queue_defaults.retention_seconds,
            ),
            dlq_retention_seconds: env_parse(
                "CODESIFT_DLQ_RETENTION_SECONDS",
                queue_defaults.dlq_retention_seconds,
            ),
        };

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            ttl_seconds: env_parse("CODESIFT_CACHE_TTL_SECONDS", cache_defaults.ttl_seconds),
            key_prefix: std::env::var("CODESIFT_CACHE_KEY_PREFIX")
                .unwrap_or(cache_defaults.key_prefix),
        };

        let submission = SubmissionConfig {
            max_content_bytes: std::env::var("CODESIFT_MAX_CONTENT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        let ai_defaults = AiConfig::default();
        let ai = AiConfig {
            enabled: env_flag("CODESIFT_ENABLE_AI"),
            provider_url: std::env::var("CODESIFT_AI_PROVIDER")
                .unwrap_or(ai_defaults.provider_url),
            model: std::env::var("CODESIFT_AI_MODEL").unwrap_or(ai_defaults.model),
            api_key: std::env::var("CODESIFT_AI_API_KEY").ok(),
            request_timeout: Duration::from_millis(env_parse(
                "CODESIFT_AI_REQUEST_TIMEOUT_MS",
                ai_defaults.request_timeout.as_millis() as u64,
            )),
            min_lines: env_parse("CODESIFT_MIN_FILE_LINES_FOR_AI", ai_defaults.min_lines),
            max_lines: env_parse("CODESIFT_MAX_FILE_LINES_FOR_AI", ai_defaults.max_lines),
        };

        let linter_defaults = LinterConfig::default();
        let linter = LinterConfig {
            command: std::env::var("CODESIFT_LINT_COMMAND").ok(),
            timeout: Duration::from_millis(env_parse(
                "CODESIFT_LINT_TIMEOUT_MS",
                linter_defaults.timeout.as_millis() as u64,
            )),
        };

        let analyzer = AnalyzerConfig {
            allow_force_fail: env_flag("CODESIFT_ALLOW_FORCE_FAIL"),
            ai,
            linter,
        };

        Self {
            db_path,
            http_host: std::env::var("CODESIFT_HTTP_HOST")
                .unwrap_or_else(|_| DEFAULT_HTTP_HOST.to_string()),
            http_port: env_parse("CODESIFT_HTTP_PORT", DEFAULT_HTTP_PORT),
            workers: env_parse("CODESIFT_WORKERS", DEFAULT_WORKERS).max(1),
            maintenance_interval: Duration::from_secs(env_parse(
                "CODESIFT_MAINTENANCE_INTERVAL_SECS",
                DEFAULT_MAINTENANCE_INTERVAL_SECS,
            )),
            queue,
            cache,
            submission,
            analyzer,
        }
    }
}
