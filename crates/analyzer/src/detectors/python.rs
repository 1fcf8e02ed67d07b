// Python-specific detectors: unsafe deserialization, shell usage and a few
// idiom hazards.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, Severity};

use super::{bucketed_issue, Detector, SourceFile};
use crate::scanner::FileScan;

static EXEC_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexec\s*\(").expect("pattern"));
static PICKLE_LOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pickle\.loads?\s*\(").expect("pattern"));
static YAML_LOAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"yaml\.load\s*\(").expect("pattern"));
static YAML_SAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SafeLoader|safe_load").expect("pattern"));
static SHELL_TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"shell\s*=\s*True").expect("pattern"));
static BARE_EXCEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"except\s*:").expect("pattern"));
static REQUESTS_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"requests\.(get|post|put|delete|patch|head)\s*\(").expect("pattern")
});
static TIMEOUT_KWARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"timeout\s*=").expect("pattern"));
static MUTABLE_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"def\s+\w+\s*\([^)]*=\s*(\[\]|\{\})").expect("pattern"));
static PLAIN_HTTP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']http://"#).expect("pattern"));
static LOCAL_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)localhost|127\.0\.0\.1").expect("pattern"));

pub struct PythonDetector;

impl Detector for PythonDetector {
    fn name(&self) -> &'static str {
        "python"
    }

    fn scan(&self, _file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let mut issues = Vec::new();

        for line in &scan.lines {
            if EXEC_CALL.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::Critical,
                    "python-exec",
                    "Dynamic code execution with exec()",
                    "Avoid exec; dispatch through a mapping of allowed operations",
                ));
            }
            if PICKLE_LOAD.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::High,
                    "python-pickle-load",
                    "Deserializing with pickle executes arbitrary code",
                    "Use json or another data-only format for untrusted input",
                ));
            }
            if YAML_LOAD.is_match(&line.text) && !YAML_SAFE.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::High,
                    "python-yaml-load",
                    "yaml.load without SafeLoader can construct arbitrary objects",
                    "Use yaml.safe_load or pass Loader=SafeLoader",
                ));
            }
            if SHELL_TRUE.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::High,
                    "python-shell-true",
                    "subprocess invoked with shell=True",
                    "Pass the command as a list and drop shell=True",
                ));
            }
            if BARE_EXCEPT.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Style,
                    Severity::Medium,
                    "python-bare-except",
                    "Bare except catches SystemExit and KeyboardInterrupt too",
                    "Catch the specific exceptions you can handle",
                ));
            }
            if REQUESTS_CALL.is_match(&line.text) && !TIMEOUT_KWARG.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Performance,
                    Severity::Medium,
                    "python-requests-no-timeout",
                    "HTTP call without a timeout can hang the caller",
                    "Pass timeout= to every requests call",
                ));
            }
            if MUTABLE_DEFAULT.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Style,
                    Severity::Medium,
                    "python-mutable-default",
                    "Mutable default argument is shared across calls",
                    "Default to None and create the container inside the function",
                ));
            }
            if PLAIN_HTTP.is_match(&line.text) && !LOCAL_HOST.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::Medium,
                    "python-plain-http",
                    "Unencrypted http:// endpoint",
                    "Use https:// for non-local endpoints",
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

    fn scan_py(content: &str) -> Vec<(Bucket, Issue)> {
        let file = SourceFile {
            name: "app.py",
            language: Language::Python,
            content,
        };
        PythonDetector.scan(&file, &FileScan::build(content))
    }

    fn rules_of(issues: &[(Bucket, Issue)]) -> Vec<&str> {
        issues.iter().map(|(_, i)| i.rule.as_str()).collect()
    }

    #[test]
    fn pickle_and_shell_true_fire() {
        let content = "\
data = pickle.loads(blob)
subprocess.run(cmd, shell=True)
";
        let issues = scan_py(content);
        let rules = rules_of(&issues);
        assert!(rules.contains(&"python-pickle-load"));
        assert!(rules.contains(&"python-shell-true"));
    }

    #[test]
    fn yaml_load_safe_loader_is_clean() {
        let hot = "cfg = yaml.load(f)\n";
        assert!(rules_of(&scan_py(hot)).contains(&"python-yaml-load"));

        let cold = "cfg = yaml.load(f, Loader=yaml.SafeLoader)\n";
        assert!(!rules_of(&scan_py(cold)).contains(&"python-yaml-load"));
    }

    #[test]
    fn requests_without_timeout() {
        let hot = "resp = requests.get(url)\n";
        assert!(rules_of(&scan_py(hot)).contains(&"python-requests-no-timeout"));

        let cold = "resp = requests.get(url, timeout=5)\n";
        assert!(!rules_of(&scan_py(cold)).contains(&"python-requests-no-timeout"));
    }

    #[test]
    fn bare_except_and_mutable_default() {
        let content = "\
def collect(items=[]):
    try:
        items.append(fetch())
    except:
        pass
";
        let issues = scan_py(content);
        let rules = rules_of(&issues);
        assert!(rules.contains(&"python-bare-except"));
        assert!(rules.contains(&"python-mutable-default"));
    }
}
