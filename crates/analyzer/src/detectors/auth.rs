// Auth-flow detectors (JS/TS), gated on auth keyword markers. Three
// hazards around token-refresh plumbing: waiter queues that leak requests
// on the error path, refresh flags with asymmetric set/clear, and waiter
// flushes that stampede the backend.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, IssueCategory, Severity};

use super::{categorized_issue, Detector, SourceFile};
use crate::scanner::FileScan;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("detector pattern compiles")
}

static AUTH_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(auth|token|refresh|login|session)\w*\b"));
static WAITER_PUSH: Lazy<Regex> =
    Lazy::new(|| re(r"(\w*(?i:pending|waiters|queue|subscribers|callbacks)\w*)\.push\s*\("));
static CATCH_HEAD: Lazy<Regex> = Lazy::new(|| re(r"\bcatch\b"));
static FINALLY_HEAD: Lazy<Regex> = Lazy::new(|| re(r"\bfinally\b"));
static REFRESH_FLAG_SET: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(\w*refresh(ing|inprogress|_in_progress)?\w*)\s*=\s*(true|false)"));
static JITTER_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)jitter|stagger|random|spread|setTimeout|delay"));

/// Whether the file gates into the auth stage at all.
pub fn has_auth_markers(content: &str) -> bool {
    AUTH_MARKER.is_match(content)
}

/// Per-line flags for membership in `catch`/`finally` blocks, tracked by
/// brace balance the same way the scanner tracks loops.
struct BlockRanges {
    in_catch: Vec<bool>,
    in_finally: Vec<bool>,
}

/// Push an entry balance for a block opened on this line. On a line like
/// `} catch (err) {` the entry level sits below `balance_after` by however
/// many braces the block keyword leaves open; a block fully closed on its
/// own line (`catch (e) {}`) is not tracked.
fn push_block(stack: &mut Vec<i32>, text: &str, keyword_at: usize, balance_after: i32) {
    let after = &text[keyword_at..];
    let opens = after.matches('{').count() as i32;
    let closes = after.matches('}').count() as i32;
    if opens > closes {
        stack.push(balance_after - (opens - closes));
    }
}

fn block_ranges(scan: &FileScan) -> BlockRanges {
    let mut in_catch = vec![false; scan.lines.len()];
    let mut in_finally = vec![false; scan.lines.len()];
    let mut catch_stack: Vec<i32> = Vec::new();
    let mut finally_stack: Vec<i32> = Vec::new();

    for (idx, line) in scan.lines.iter().enumerate() {
        if let Some(m) = CATCH_HEAD.find(&line.text) {
            push_block(&mut catch_stack, &line.text, m.start(), line.balance_after);
        }
        if let Some(m) = FINALLY_HEAD.find(&line.text) {
            push_block(&mut finally_stack, &line.text, m.start(), line.balance_after);
        }
        in_catch[idx] = !catch_stack.is_empty();
        in_finally[idx] = !finally_stack.is_empty();

        while catch_stack.last().map(|e| *e >= line.balance_after).unwrap_or(false) {
            catch_stack.pop();
        }
        while finally_stack.last().map(|e| *e >= line.balance_after).unwrap_or(false) {
            finally_stack.pop();
        }
    }

    BlockRanges {
        in_catch,
        in_finally,
    }
}

pub struct AuthDetector;

impl Detector for AuthDetector {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn scan(&self, file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let ranges = block_ranges(scan);
        let mut issues = Vec::new();
        issues.extend(lost_requests_on_error(scan, &ranges));
        issues.extend(refresh_flag_hazard(scan, &ranges));
        issues.extend(thundering_herd(file, scan));
        issues
    }
}

/// A waiter queue must be drained on both the success and the error path.
/// If every drain site sits outside catch blocks while the file does have
/// catch blocks, requests queued before a failure are lost forever.
fn lost_requests_on_error(scan: &FileScan, ranges: &BlockRanges) -> Vec<(Bucket, Issue)> {
    let mut issues = Vec::new();
    let mut reported: Vec<String> = Vec::new();

    for (idx, line) in scan.lines.iter().enumerate() {
        let Some(caps) = WAITER_PUSH.captures(&line.text) else {
            continue;
        };
        let var = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        if var.is_empty() || reported.contains(&var) {
            continue;
        }

        let drain = re(&format!(
            r"{}\s*\.\s*(forEach|shift|splice|flush|length\s*=\s*0)",
            regex::escape(&var)
        ));
        let mut drains_total = 0;
        let mut drains_in_catch = 0;
        let mut has_catch = false;
        for (j, other) in scan.lines.iter().enumerate() {
            if j == idx {
                continue;
            }
            if ranges.in_catch[j] {
                has_catch = true;
            }
            if drain.is_match(&other.text) {
                drains_total += 1;
                if ranges.in_catch[j] {
                    drains_in_catch += 1;
                }
            }
        }
        // Also count catch blocks that exist anywhere in the file.
        has_catch |= ranges.in_catch.iter().any(|c| *c);

        if drains_total > 0 && drains_in_catch == 0 && has_catch {
            reported.push(var.clone());
            issues.push(categorized_issue(
                line.number,
                IssueCategory::Reliability,
                Severity::High,
                "lost-requests-on-error",
                "Waiter queue is drained on success but not on the error path",
                "Flush (reject) queued waiters inside the catch block too",
            ));
        }
    }
    issues
}

/// The refresh flag needs a symmetric set-true/set-false count and a
/// finally-scoped reset; otherwise a thrown refresh leaves it latched and
/// every later request queues forever.
fn refresh_flag_hazard(scan: &FileScan, ranges: &BlockRanges) -> Vec<(Bucket, Issue)> {
    let mut set_true = 0;
    let mut set_false = 0;
    let mut false_in_finally = false;
    let mut first_set_line = None;

    for (idx, line) in scan.lines.iter().enumerate() {
        for caps in REFRESH_FLAG_SET.captures_iter(&line.text) {
            let value = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            if value == "true" {
                set_true += 1;
                first_set_line.get_or_insert(line.number);
            } else {
                set_false += 1;
                if ranges.in_finally[idx] {
                    false_in_finally = true;
                }
            }
        }
    }

    if set_true == 0 {
        return Vec::new();
    }
    if set_true == set_false && false_in_finally {
        return Vec::new();
    }

    let message = if set_true != set_false {
        "Refresh flag set/clear counts are asymmetric; a failure path can leave it latched"
    } else {
        "Refresh flag is not cleared in a finally block; a throw skips the reset"
    };
    vec![categorized_issue(
        first_set_line.unwrap_or(1),
        IssueCategory::Reliability,
        Severity::High,
        "refresh-state-hazard",
        message,
        "Reset the flag in a finally block so every exit path clears it",
    )]
}

/// Flushing the waiter queue with unbounded parallelism stampedes the
/// freshly-refreshed backend unless the flush is staggered.
fn thundering_herd(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if JITTER_MARKER.is_match(file.content) {
        return Vec::new();
    }
    let mut issues = Vec::new();
    for line in &scan.lines {
        let Some(caps) = WAITER_PUSH.captures(&file.content) else {
            break;
        };
        let var = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if var.is_empty() {
            break;
        }
        let flush = re(&format!(
            r"{}\s*\.\s*(forEach|map)\s*\(|Promise\.all(Settled)?\s*\(\s*{}",
            regex::escape(var),
            regex::escape(var)
        ));
        if flush.is_match(&line.text) {
            issues.push(categorized_issue(
                line.number,
                IssueCategory::Concurrency,
                Severity::High,
                "thundering-herd",
                "Waiter queue flushed with unbounded parallelism",
                "Stagger the flush (jitter or small batches) to avoid a stampede",
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn scan_auth(content: &str) -> Vec<(Bucket, Issue)> {
        let file = SourceFile {
            name: "auth.js",
            language: Language::JavaScript,
            content,
        };
        AuthDetector.scan(&file, &FileScan::build(content))
    }

    fn rules_of(issues: &[(Bucket, Issue)]) -> Vec<&str> {
        issues.iter().map(|(_, i)| i.rule.as_str()).collect()
    }

    #[test]
    fn gate_requires_auth_keywords() {
        assert!(has_auth_markers("async function refreshToken() {}"));
        assert!(!has_auth_markers("const sum = a + b;"));
    }

    #[test]
    fn success_only_drain_loses_requests() {
        let content = "\
async function refreshToken() {
  pendingRequests.push(resolve);
  try {
    const token = await doRefresh();
    pendingRequests.forEach((r) => r(token));
  } catch (err) {
    log(err);
  }
}
";
        let issues = scan_auth(content);
        let hit = issues
            .iter()
            .find(|(_, i)| i.rule == "lost-requests-on-error")
            .expect("fires");
        assert_eq!(hit.0, Bucket::Security); // reliability routes to security
    }

    #[test]
    fn draining_in_catch_is_clean() {
        let content = "\
async function refreshToken() {
  pendingRequests.push(resolve);
  try {
    const token = await doRefresh();
    pendingRequests.forEach((r) => r(token));
  } catch (err) {
    pendingRequests.forEach((r) => r(null));
  }
}
";
        assert!(!rules_of(&scan_auth(content)).contains(&"lost-requests-on-error"));
    }

    #[test]
    fn asymmetric_refresh_flag_fires() {
        let content = "\
let isRefreshing = false;
async function refresh() {
  isRefreshing = true;
  await doRefresh();
}
";
        let issues = scan_auth(content);
        assert!(rules_of(&issues).contains(&"refresh-state-hazard"));
    }

    #[test]
    fn finally_scoped_reset_is_clean() {
        let content = "\
async function refresh() {
  isRefreshing = true;
  try {
    await doRefresh();
  } finally {
    isRefreshing = false;
  }
}
";
        assert!(!rules_of(&scan_auth(content)).contains(&"refresh-state-hazard"));
    }

    #[test]
    fn unstaggered_flush_is_a_thundering_herd() {
        let content = "\
subscribers.push(cb);
subscribers.forEach((cb) => cb(token));
";
        let issues = scan_auth(content);
        assert!(rules_of(&issues).contains(&"thundering-herd"));
    }

    #[test]
    fn jittered_flush_is_clean() {
        let content = "\
subscribers.push(cb);
subscribers.forEach((cb, i) => setTimeout(() => cb(token), i * jitter()));
";
        assert!(!rules_of(&scan_auth(content)).contains(&"thundering-herd"));
    }
}
