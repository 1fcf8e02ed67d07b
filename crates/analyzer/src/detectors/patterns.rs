// Generic pattern detectors: one pass over the scanned lines with
// pre-compiled patterns. Loop-gated rules consult the shared loop-depth
// view; a couple of rules need whole-file context and run after the line
// pass.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, Severity};

use super::{bucketed_issue, Detector, SourceFile};
use crate::language::Language;
use crate::scanner::FileScan;

struct LineRule {
    id: &'static str,
    bucket: Bucket,
    severity: Severity,
    /// Fires only at loop depth >= 1.
    loop_only: bool,
    /// Restrict to specific languages (None = all).
    languages: Option<&'static [Language]>,
    pattern: Regex,
    /// When present, the line must also match this (e.g. a dynamic-content
    /// marker for injection rules, or a password context for weak digests).
    context: Option<Regex>,
    message: &'static str,
    suggestion: &'static str,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("detector pattern compiles")
}

const JS_LIKE: &[Language] = &[Language::JavaScript, Language::TypeScript];

static LINE_RULES: Lazy<Vec<LineRule>> = Lazy::new(|| {
    vec![
        LineRule {
            id: "no-eval",
            bucket: Bucket::Security,
            severity: Severity::Critical,
            loop_only: false,
            languages: None,
            pattern: re(r"\beval\s*\("),
            context: None,
            message: "Dynamic code evaluation with eval()",
            suggestion: "Parse the input or dispatch through a whitelist instead of eval",
        },
        LineRule {
            id: "command-injection",
            bucket: Bucket::Security,
            severity: Severity::Critical,
            loop_only: false,
            languages: None,
            pattern: re(
                r"child_process|execSync\s*\(|\bspawnSync?\s*\(|os\.system\s*\(|subprocess\.(call|run|Popen)|popen\s*\(",
            ),
            context: Some(re(r#"\+|\$\{|%s|\.format\(|f["']"#)),
            message: "Shell command built from dynamic input",
            suggestion: "Pass arguments as a list and never interpolate user input into a shell string",
        },
        LineRule {
            id: "sql-injection",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: None,
            pattern: re(r"(?i)\b(select|insert|update|delete)\b.+\b(from|into|set|where)\b"),
            context: Some(re(r#"\+\s*\w|\$\{|%s|\.format\(|f["']|\|\|"#)),
            message: "SQL statement assembled by string concatenation or interpolation",
            suggestion: "Use parameterized queries / prepared statements",
        },
        LineRule {
            id: "dom-xss",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: Some(JS_LIKE),
            pattern: re(r"(innerHTML|outerHTML)\s*\+?=|document\.write(ln)?\s*\(|insertAdjacentHTML\s*\("),
            context: Some(re(r"\+|\$\{")),
            message: "HTML sink written with dynamic content",
            suggestion: "Use textContent or sanitize the markup before insertion",
        },
        LineRule {
            id: "hardcoded-credentials",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: None,
            pattern: re(r#"(?i)(password|passwd|secret|api[_-]?key|token|credential)\s*[:=]\s*["'][^"']{8,}["']"#),
            context: None,
            message: "Credential literal embedded in source",
            suggestion: "Load secrets from the environment or a secrets manager",
        },
        LineRule {
            id: "weak-hash",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: None,
            pattern: re(r"(?i)\b(md5|sha1)\b"),
            context: Some(re(r"(?i)(password|passwd|pwd|credential|login)")),
            message: "Weak digest algorithm in a password context",
            suggestion: "Use a salted password hash (bcrypt, scrypt or argon2)",
        },
        LineRule {
            id: "open-redirect",
            bucket: Bucket::Security,
            severity: Severity::Medium,
            loop_only: false,
            languages: None,
            pattern: re(r"(?i)redirect\s*\(|location\.href\s*=|sendRedirect\s*\("),
            context: Some(re(r"(req|request)\.|params|query")),
            message: "Redirect target taken from request input",
            suggestion: "Validate the target against an allowlist of internal paths",
        },
        LineRule {
            id: "insecure-random",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: None,
            pattern: re(r"Math\.random\s*\(\)|random\.random\s*\(\)|\brand\s*\(\)"),
            context: Some(re(r"(?i)(token|session|secret|password|key|nonce|otp)")),
            message: "Non-cryptographic RNG used for a security-sensitive identifier",
            suggestion: "Use a CSPRNG (crypto.randomBytes / secrets module)",
        },
        LineRule {
            id: "path-traversal",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: None,
            pattern: re(r"(readFile|writeFile|createReadStream|createWriteStream|unlink|sendFile)\s*\("),
            context: Some(re(r"\+|\$\{|\.\./")),
            message: "File path built from dynamic input",
            suggestion: "Resolve against a base directory and reject paths that escape it",
        },
        LineRule {
            id: "prototype-pollution",
            bucket: Bucket::Security,
            severity: Severity::High,
            loop_only: false,
            languages: Some(JS_LIKE),
            pattern: re(r#"__proto__|\[["']__proto__["']\]"#),
            context: None,
            message: "Direct __proto__ access enables prototype pollution",
            suggestion: "Use Object.create(null) maps or block the __proto__ key",
        },
        LineRule {
            id: "empty-catch",
            bucket: Bucket::Style,
            severity: Severity::Medium,
            loop_only: false,
            languages: None,
            pattern: re(r"catch\s*(\([^)]*\))?\s*\{\s*\}"),
            context: None,
            message: "Exception swallowed by an empty catch block",
            suggestion: "Log the error or rethrow; silent failures hide defects",
        },
        LineRule {
            id: "n-plus-one-query",
            bucket: Bucket::Performance,
            severity: Severity::High,
            loop_only: true,
            languages: None,
            pattern: re(
                r"(?i)\b(db|database|client|pool|conn|connection|repo|repository|model|orm)\w*\.(query|execute|find\w*|get\w*|save|insert|update|delete)\s*\(",
            ),
            context: None,
            message: "Database call inside a loop (N+1 access pattern)",
            suggestion: "Batch the lookups or move the query outside the loop",
        },
        LineRule {
            id: "blocking-io",
            bucket: Bucket::Performance,
            severity: Severity::Medium,
            loop_only: false,
            languages: None,
            pattern: re(r"readFileSync|writeFileSync|existsSync|execSync|Thread\.sleep\s*\(|time\.sleep\s*\("),
            context: None,
            message: "Synchronous blocking I/O",
            suggestion: "Use the async variant so the event loop keeps serving requests",
        },
        LineRule {
            id: "string-concat-in-loop",
            bucket: Bucket::Performance,
            severity: Severity::Medium,
            loop_only: true,
            languages: None,
            pattern: re(r#"\w+\s*\+=\s*["'`]|\w+\s*=\s*\w+\s*\+\s*["'`]"#),
            context: None,
            message: "String concatenation inside a loop",
            suggestion: "Collect parts in an array and join once after the loop",
        },
        LineRule {
            id: "regex-in-loop",
            bucket: Bucket::Performance,
            severity: Severity::Medium,
            loop_only: true,
            languages: None,
            pattern: re(r"new\s+RegExp\s*\(|re\.compile\s*\(|Pattern\.compile\s*\("),
            context: None,
            message: "Regex compiled inside a loop",
            suggestion: "Hoist the compilation out of the loop and reuse the instance",
        },
        LineRule {
            id: "loose-equality",
            bucket: Bucket::Style,
            severity: Severity::Low,
            loop_only: false,
            languages: Some(JS_LIKE),
            pattern: re(r"[^=!<>]==[^=]|[^!=]!=[^=]"),
            context: None,
            message: "Loose equality comparison",
            suggestion: "Use === / !== to avoid implicit coercion",
        },
    ]
});

static WHILE_TRUE: Lazy<Regex> =
    Lazy::new(|| re(r"while\s*\(\s*(true|1)\s*\)"));
static LOOP_ESCAPE: Lazy<Regex> =
    Lazy::new(|| re(r"\bbreak\b|\breturn\b|\bthrow\b|process\.exit"));

static REQUEST_INPUT: Lazy<Regex> = Lazy::new(|| re(r"req\.(body|params|query)"));
static VALIDATION_MARKER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)validat|joi|zod|yup|schema|sanitiz"));

pub struct PatternDetector;

impl Detector for PatternDetector {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn scan(&self, file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let mut issues = Vec::new();

        for line in &scan.lines {
            for rule in LINE_RULES.iter() {
                if rule.loop_only && !line.in_loop() {
                    continue;
                }
                if let Some(languages) = rule.languages {
                    if !languages.contains(&file.language) {
                        continue;
                    }
                }
                if !rule.pattern.is_match(&line.text) {
                    continue;
                }
                if let Some(context) = &rule.context {
                    if !context.is_match(&line.text) {
                        continue;
                    }
                }
                issues.push(bucketed_issue(
                    line.number,
                    rule.bucket,
                    rule.severity,
                    rule.id,
                    rule.message,
                    rule.suggestion,
                ));
            }
        }

        issues.extend(infinite_loops(scan));
        issues.extend(missing_input_validation(file, scan));
        issues
    }
}

/// `while (true)` whose body never breaks out: walk forward with the brace
/// balance until the loop closes, looking for an escape.
fn infinite_loops(scan: &FileScan) -> Vec<(Bucket, Issue)> {
    let mut issues = Vec::new();
    for (idx, line) in scan.lines.iter().enumerate() {
        if !WHILE_TRUE.is_match(&line.text) {
            continue;
        }
        let entry_balance = if idx == 0 {
            0
        } else {
            scan.lines[idx - 1].balance_after
        };
        let mut escaped = LOOP_ESCAPE.is_match(&line.text);
        for body_line in &scan.lines[idx + 1..] {
            if escaped || body_line.balance_after <= entry_balance {
                break;
            }
            if LOOP_ESCAPE.is_match(&body_line.text) {
                escaped = true;
            }
        }
        if !escaped {
            issues.push(bucketed_issue(
                line.number,
                Bucket::Performance,
                Severity::Critical,
                "infinite-loop",
                "while(true) loop with no break, return or throw",
                "Add a termination condition or an explicit break",
            ));
        }
    }
    issues
}

/// Request input consumed without any validation construct in the file.
fn missing_input_validation(file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
    if !file.language.is_js_like() || VALIDATION_MARKER.is_match(file.content) {
        return Vec::new();
    }
    scan.lines
        .iter()
        .filter(|line| REQUEST_INPUT.is_match(&line.text))
        .map(|line| {
            bucketed_issue(
                line.number,
                Bucket::Security,
                Severity::Medium,
                "missing-input-validation",
                "Request input used without validation",
                "Validate the payload against a schema before use",
            )
        })
        .collect()
}
