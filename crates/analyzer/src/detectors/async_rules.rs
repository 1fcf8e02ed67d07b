// Async/concurrency detectors (JS/TS). Only invoked when the file exhibits
// async markers; every issue carries a category and is routed to its
// report bucket through the fixed mapping.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, IssueCategory, Severity};

use super::{categorized_issue, Detector, SourceFile};
use crate::scanner::FileScan;

static ASYNC_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\basync\b|\bawait\b|\bPromise\b|\.then\s*\(").expect("pattern"));
static THEN_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.then\s*\(").expect("pattern"));
static CATCH_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.catch\s*\(").expect("pattern"));
static AWAIT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bawait\b").expect("pattern"));
static PROMISE_ALL_MAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Promise\.all(Settled)?\s*\(\s*\w+\.map\s*\(").expect("pattern")
});

/// Lines to look ahead for a `.catch` continuation of a promise chain.
const CATCH_LOOKAHEAD: usize = 3;

/// Whether the file gates into the async stage at all.
pub fn has_async_markers(content: &str) -> bool {
    ASYNC_MARKER.is_match(content)
}

pub struct AsyncDetector;

impl Detector for AsyncDetector {
    fn name(&self) -> &'static str {
        "async"
    }

    fn scan(&self, _file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let mut issues = Vec::new();

        for (idx, line) in scan.lines.iter().enumerate() {
            // Promise chain without a rejection handler in sight.
            if THEN_CALL.is_match(&line.text) && !AWAIT_KEYWORD.is_match(&line.text) {
                let window_end = (idx + 1 + CATCH_LOOKAHEAD).min(scan.lines.len());
                let handled = CATCH_CALL.is_match(&line.text)
                    || scan.lines[idx + 1..window_end]
                        .iter()
                        .any(|l| CATCH_CALL.is_match(&l.text));
                if !handled {
                    issues.push(categorized_issue(
                        line.number,
                        IssueCategory::Reliability,
                        Severity::High,
                        "unhandled-promise-rejection",
                        "Promise chain without a .catch handler",
                        "Attach .catch or await inside try/catch so rejections surface",
                    ));
                }
            }

            if line.in_loop() && AWAIT_KEYWORD.is_match(&line.text) {
                issues.push(categorized_issue(
                    line.number,
                    IssueCategory::Performance,
                    Severity::Medium,
                    "await-in-loop",
                    "Sequential awaits inside a loop serialize independent I/O",
                    "Collect the promises and await them together (with a concurrency cap)",
                ));
            }

            if PROMISE_ALL_MAP.is_match(&line.text) {
                issues.push(categorized_issue(
                    line.number,
                    IssueCategory::Concurrency,
                    Severity::Medium,
                    "unbounded-parallelism",
                    "Promise.all over an unbounded map fans out without a limit",
                    "Chunk the work or use a concurrency-limited pool",
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn scan_js(content: &str) -> Vec<(Bucket, Issue)> {
        let file = SourceFile {
            name: "a.js",
            language: Language::JavaScript,
            content,
        };
        AsyncDetector.scan(&file, &FileScan::build(content))
    }

    fn rules_of(issues: &[(Bucket, Issue)]) -> Vec<&str> {
        issues.iter().map(|(_, i)| i.rule.as_str()).collect()
    }

    #[test]
    fn gate_detects_async_markers() {
        assert!(has_async_markers("async function run() {}"));
        assert!(has_async_markers("fetch(url).then(handle)"));
        assert!(!has_async_markers("const a = 1;"));
    }

    #[test]
    fn then_without_catch_fires_and_routes_to_security() {
        let issues = scan_js("fetch(url).then(handle);\n");
        let hit = issues
            .iter()
            .find(|(_, i)| i.rule == "unhandled-promise-rejection")
            .expect("fires");
        // reliability routes to the security bucket
        assert_eq!(hit.0, Bucket::Security);
        assert_eq!(hit.1.category, Some(IssueCategory::Reliability));
    }

    #[test]
    fn then_with_nearby_catch_is_clean() {
        let content = "fetch(url)\n  .then(handle)\n  .catch(report);\n";
        assert!(!rules_of(&scan_js(content)).contains(&"unhandled-promise-rejection"));
    }

    #[test]
    fn await_in_loop_routes_to_performance() {
        let content = "for (const id of ids) {\n  await load(id);\n}\n";
        let issues = scan_js(content);
        let hit = issues
            .iter()
            .find(|(_, i)| i.rule == "await-in-loop")
            .expect("fires");
        assert_eq!(hit.0, Bucket::Performance);
        assert_eq!(hit.1.line, 2);
    }

    #[test]
    fn promise_all_map_is_flagged() {
        let issues = scan_js("await Promise.all(items.map(process));\n");
        assert!(rules_of(&issues).contains(&"unbounded-parallelism"));
    }
}
