// Semantic detectors (JS/TS): higher-order patterns over the whole file.
// Each rule is a heuristic; every issue carries a category and routes to its
// bucket through the fixed mapping.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, IssueCategory, Severity};

use super::{categorized_issue, Detector, SourceFile};
use crate::scanner::FileScan;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("detector pattern compiles")
}

static EVENT_HANDLER: Lazy<Regex> =
    Lazy::new(|| re(r#"\.on\s*\(\s*['"]|addEventListener\s*\("#));
static TRY_OR_CATCH: Lazy<Regex> = Lazy::new(|| re(r"try\s*\{|\.catch\s*\("));

static QUEUE_DRAIN_LOOP: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)while\s*\(.*(queue|pending|backlog|buffer)\w*\.length"));
static DRAIN_GUARD: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)isprocessing|draining|mutex|\block\b"));
static AWAIT_KEYWORD: Lazy<Regex> = Lazy::new(|| re(r"\bawait\b"));

static RETRY_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?i)retr(y|ies)"));
static RETRY_LOOP: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(while|for)\s*\(.*(retr|attempt)|attempts?\s*(<|<=|\+\+)"));
static BACKOFF_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)backoff|delay|sleep|setTimeout|jitter|\bwait\b"));

static QUEUE_PUSH: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(queue|pending|backlog|buffer)\w*\.push\s*\("));
static QUEUE_CONSUME: Lazy<Regex> =
    Lazy::new(|| re(r"\.(shift|pop|splice)\s*\(|(?i)maxsize|max_size|\blimit\b|capacity|highwatermark"));

static SERVER_START: Lazy<Regex> = Lazy::new(|| re(r"\.listen\s*\(|createServer\s*\("));
static SHUTDOWN_HOOK: Lazy<Regex> = Lazy::new(|| re(r"SIGTERM|SIGINT|\.close\s*\("));

static ASYNC_MARKER: Lazy<Regex> = Lazy::new(|| re(r"\basync\b|\bawait\b|\bPromise\b"));
static THIS_MUTATION: Lazy<Regex> = Lazy::new(|| re(r"this\.\w+\s*(\+\+|--|\+=|-=)"));

static CALLBACK_OPEN: Lazy<Regex> = Lazy::new(|| re(r"function\s*\(|=>\s*\{"));

static MATH_RANDOM: Lazy<Regex> = Lazy::new(|| re(r"Math\.random\s*\("));

static RATE_LIMIT_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?i)rate.?limit"));
static WINDOW_RESET: Lazy<Regex> = Lazy::new(|| re(r"setInterval\s*\("));

static WALL_CLOCK_INTERVAL: Lazy<Regex> = Lazy::new(|| {
    re(r"Date\.now\(\)\s*-\s*|-\s*Date\.now\(\)|new Date\(\)\.getTime\(\)\s*-")
});

static CACHE_MAP: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(cache|memo)\w*\s*=\s*(new\s+Map\s*\(|\{\})"));
static EVICTION_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bttl\b|evict|expir|\blru\b|\.delete\s*\(|maxsize|max_entries"));

static COUNTER_MUTATION: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b\w*(count|counter|total)\w*\s*(\+\+|--|\+=|-=)"));

static ROUTE_HANDLER: Lazy<Regex> =
    Lazy::new(|| re(r"(app|router)\.(get|post|put|delete|use)\s*\("));
static TOP_LEVEL_MUTABLE: Lazy<Regex> = Lazy::new(|| re(r"^(let|var)\s+\w+\s*="));

static STREAM_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?i)stream|producer|publish"));
static PUSH_OR_WRITE: Lazy<Regex> = Lazy::new(|| re(r"\.(push|write)\s*\("));
static BACKPRESSURE_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)drain|pause|backpressure|highwatermark|\bawait\b"));

/// Lines scanned after an event-handler registration for error protection.
const HANDLER_LOOKAHEAD: usize = 8;
/// Lines scanned after a drain loop head for an await.
const DRAIN_LOOKAHEAD: usize = 10;
/// Brace depth at which callback nesting is reported.
const NESTING_THRESHOLD: i32 = 4;

pub struct SemanticDetector;

impl Detector for SemanticDetector {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn scan(&self, file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let mut issues = Vec::new();
        issues.extend(unprotected_event_handlers(scan));
        issues.extend(queue_drain_reentrancy(file, scan));
        issues.extend(retry_without_backoff(file, scan));
        issues.extend(unbounded_queue_growth(file, scan));
        issues.extend(missing_graceful_shutdown(file, scan));
        issues.extend(shared_state_in_async(file, scan));
        issues.extend(callback_nesting(scan));
        issues.extend(nondeterministic_retry_rng(file, scan));
        issues.extend(fixed_window_rate_limiter(file, scan));
        issues.extend(wall_clock_interval(scan));
        issues.extend(cache_without_eviction(file, scan));
        issues.extend(non_atomic_counters(file, scan));
        issues.extend(global_state_in_handlers(file, scan));
        issues.extend(missing_backpressure(file, scan));
        issues
    }
}

fn unprotected_event_handlers(scan: &FileScan) -> Vec<(Bucket, Issue)> {
    let mut issues = Vec::new();
    for (idx, line) in scan.lines.iter().enumerate() {
        if !EVENT_HANDLER.is_match(&line.text) {
            continue;
        }
        let window_end = (idx + 1 + HANDLER_LOOKAHEAD).min(scan.lines.len());
        let protected = TRY_OR_CATCH.is_match(&line.text)
            || scan.lines[idx..window_end]
                .iter()
                .any(|l| TRY_OR_CATCH.is_match(&l.text));
        if !protected {
            issues.push(categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Medium,
                "unprotected-event-handler",
                "Event handler body has no error protection",
                "Wrap the handler in try/catch so one bad event cannot kill the listener",
            ));
        }
    }
    issues
}

fn queue_drain_reentrancy(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if DRAIN_GUARD.is_match(file.content) {
        return Vec::new();
    }
    let mut issues = Vec::new();
    for (idx, line) in scan.lines.iter().enumerate() {
        if !QUEUE_DRAIN_LOOP.is_match(&line.text) {
            continue;
        }
        let window_end = (idx + 1 + DRAIN_LOOKAHEAD).min(scan.lines.len());
        let awaits_inside = scan.lines[idx..window_end]
            .iter()
            .any(|l| AWAIT_KEYWORD.is_match(&l.text));
        if awaits_inside {
            issues.push(categorized_issue(
                line.number,
                IssueCategory::Concurrency,
                Severity::High,
                "queue-drain-reentrancy",
                "Queue-draining loop awaits without a re-entrancy guard",
                "Guard the drain with an isProcessing flag so concurrent callers cannot interleave",
            ));
        }
    }
    issues
}

fn retry_without_backoff(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !RETRY_MARKER.is_match(file.content) || BACKOFF_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .find(|line| RETRY_LOOP.is_match(&line.text))
        .map(|line| {
            vec![categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Medium,
                "retry-without-backoff",
                "Retry loop with no delay or exponential policy",
                "Sleep with exponential backoff (plus jitter) between attempts",
            )]
        })
        .unwrap_or_default()
}

fn unbounded_queue_growth(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if QUEUE_CONSUME.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| QUEUE_PUSH.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::MemoryLeak,
                Severity::Medium,
                "unbounded-queue-growth",
                "Queue only ever grows; nothing consumes or bounds it",
                "Cap the queue size or drop/reject work beyond a limit",
            )
        })
        .collect()
}

fn missing_graceful_shutdown(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !SERVER_START.is_match(file.content) || SHUTDOWN_HOOK.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .find(|line| SERVER_START.is_match(&line.text))
        .map(|line| {
            vec![categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Medium,
                "missing-graceful-shutdown",
                "Server starts but no shutdown signal is handled",
                "Handle SIGTERM/SIGINT and close the server to drain in-flight requests",
            )]
        })
        .unwrap_or_default()
}

fn shared_state_in_async(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !ASYNC_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| THIS_MUTATION.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::Concurrency,
                Severity::Medium,
                "shared-state-in-async",
                "Instance state mutated from an async method",
                "Interleaved awaits can observe torn state; confine or synchronize the mutation",
            )
        })
        .collect()
}

fn callback_nesting(scan: &FileScan) -> Vec<(Bucket, Issue)> {
    for line in &scan.lines {
        let depth_before = line.balance_after
            - (line.text.matches('{').count() as i32 - line.text.matches('}').count() as i32);
        if CALLBACK_OPEN.is_match(&line.text) && depth_before >= NESTING_THRESHOLD {
            return vec![categorized_issue(
                line.number,
                IssueCategory::Design,
                Severity::Medium,
                "callback-nesting-depth",
                "Callback nesting is deep enough to hide control flow",
                "Flatten with async/await or extract named functions",
            )];
        }
    }
    Vec::new()
}

fn nondeterministic_retry_rng(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    let test_context = file.name.contains("test") || file.name.contains("spec");
    if !RETRY_MARKER.is_match(file.content) && !test_context {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| MATH_RANDOM.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::Testability,
                Severity::Low,
                "nondeterministic-retry-rng",
                "Unseeded RNG in a retry/test context defeats reproducibility",
                "Inject the RNG (or the jitter function) so tests can pin it",
            )
        })
        .collect()
}

fn fixed_window_rate_limiter(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !RATE_LIMIT_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .find(|line| WINDOW_RESET.is_match(&line.text))
        .map(|line| {
            vec![categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Medium,
                "fixed-window-rate-limiter",
                "Fixed-window limiter admits double bursts at window edges",
                "Use a sliding window or token bucket",
            )]
        })
        .unwrap_or_default()
}

fn wall_clock_interval(scan: &FileScan) -> Vec<(Bucket, Issue)> {
    scan.lines
        .iter()
        .filter(|line| WALL_CLOCK_INTERVAL.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Low,
                "wall-clock-interval",
                "Interval math on the wall clock breaks under clock adjustments",
                "Use a monotonic timer (performance.now / process.hrtime) for durations",
            )
        })
        .collect()
}

fn cache_without_eviction(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if EVICTION_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| CACHE_MAP.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::MemoryLeak,
                Severity::Medium,
                "cache-without-eviction",
                "Cache map with no TTL or eviction grows without bound",
                "Evict by TTL or LRU, or cap the entry count",
            )
        })
        .collect()
}

fn non_atomic_counters(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !ASYNC_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| COUNTER_MUTATION.is_match(&line.text) && !line.text.contains("this."))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::Concurrency,
                Severity::Medium,
                "non-atomic-counter",
                "Read-modify-write counter in concurrent context",
                "Serialize the update or use an atomic primitive",
            )
        })
        .collect()
}

fn global_state_in_handlers(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !ROUTE_HANDLER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| TOP_LEVEL_MUTABLE.is_match(&line.text))
        .map(|line| {
            categorized_issue(
                line.number,
                IssueCategory::Concurrency,
                Severity::High,
                "global-state-in-handler",
                "Module-level mutable state shared across request handlers",
                "Scope the state per request or move it behind a store",
            )
        })
        .collect()
}

fn missing_backpressure(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !STREAM_MARKER.is_match(file.content) || BACKPRESSURE_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .find(|line| line.in_loop() && PUSH_OR_WRITE.is_match(&line.text))
        .map(|line| {
            vec![categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::Medium,
                "missing-backpressure",
                "Producer loop writes without honoring backpressure",
                "Check the write() return value and wait for drain before continuing",
            )]
        })
        .unwrap_or_default()
}
