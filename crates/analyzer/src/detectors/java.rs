// Java-specific detectors: per-line predicates plus whole-file checks for
// XML parser hardening and plaintext HTTP.

use once_cell::sync::Lazy;
use regex::Regex;

use codesift_core::domain::{Bucket, Issue, Severity};

use super::{bucketed_issue, Detector, SourceFile};
use crate::scanner::FileScan;

static RUNTIME_EXEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Runtime\.getRuntime\(\)\.exec").expect("pattern"));
static NEW_RANDOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"new\s+Random\s*\(").expect("pattern"));
static SECURITY_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(token|session|password|secret|key|otp|nonce)").expect("pattern"));
static PRINT_STACKTRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.printStackTrace\s*\(").expect("pattern"));
static XML_FACTORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"DocumentBuilderFactory|SAXParserFactory|XMLInputFactory").expect("pattern")
});
static XML_HARDENING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"setFeature|FEATURE_SECURE_PROCESSING|disallow-doctype-decl").expect("pattern")
});
static PLAIN_HTTP: Lazy<Regex> = Lazy::new(|| Regex::new(r#""http://"#).expect("pattern"));
static LOCAL_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)localhost|127\.0\.0\.1").expect("pattern"));

pub struct JavaDetector;

impl Detector for JavaDetector {
    fn name(&self) -> &'static str {
        "java"
    }

    fn scan(&self, file: &SourceFile<'_>, scan: &FileScan) -> Vec<(Bucket, Issue)> {
        let mut issues = Vec::new();

        for line in &scan.lines {
            if RUNTIME_EXEC.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::Critical,
                    "java-runtime-exec",
                    "Process spawned through Runtime.getRuntime().exec",
                    "Use ProcessBuilder with an argument list and validate inputs",
                ));
            }
            if NEW_RANDOM.is_match(&line.text) && SECURITY_CONTEXT.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::High,
                    "java-insecure-random",
                    "java.util.Random used for a security-sensitive value",
                    "Use java.security.SecureRandom",
                ));
            }
            if PRINT_STACKTRACE.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Style,
                    Severity::Low,
                    "java-print-stacktrace",
                    "printStackTrace writes to stderr and bypasses logging",
                    "Log the exception through the application logger",
                ));
            }
            if PLAIN_HTTP.is_match(&line.text) && !LOCAL_HOST.is_match(&line.text) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::Medium,
                    "java-plain-http",
                    "Unencrypted http:// endpoint",
                    "Use https:// for non-local endpoints",
                ));
            }
        }

        // Whole-file: an XML parser factory without any hardening feature.
        if XML_FACTORY.is_match(file.content) && !XML_HARDENING.is_match(file.content) {
            if let Some(line) = scan.lines.iter().find(|l| XML_FACTORY.is_match(&l.text)) {
                issues.push(bucketed_issue(
                    line.number,
                    Bucket::Security,
                    Severity::High,
                    "java-xxe",
                    "XML parser created without secure-processing features (XXE)",
                    "Enable FEATURE_SECURE_PROCESSING and disallow DOCTYPE declarations",
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

    fn scan_java(content: &str) -> Vec<(Bucket, Issue)> {
        let file = SourceFile {
            name: "Widget.java",
            language: Language::Java,
            content,
        };
        JavaDetector.scan(&file, &FileScan::build(content))
    }

    fn rules_of(issues: &[(Bucket, Issue)]) -> Vec<&str> {
        issues.iter().map(|(_, i)| i.rule.as_str()).collect()
    }

    #[test]
    fn runtime_exec_is_critical() {
        let issues = scan_java("Process p = Runtime.getRuntime().exec(cmd);\n");
        let hit = issues
            .iter()
            .find(|(_, i)| i.rule == "java-runtime-exec")
            .expect("fires");
        assert_eq!(hit.1.severity, Severity::Critical);
        assert_eq!(hit.0, Bucket::Security);
    }

    #[test]
    fn xxe_fires_without_hardening() {
        let hot = "DocumentBuilderFactory dbf = DocumentBuilderFactory.newInstance();\n";
        assert!(rules_of(&scan_java(hot)).contains(&"java-xxe"));

        let cold = "\
DocumentBuilderFactory dbf = DocumentBuilderFactory.newInstance();
dbf.setFeature(XMLConstants.FEATURE_SECURE_PROCESSING, true);
";
        assert!(!rules_of(&scan_java(cold)).contains(&"java-xxe"));
    }

    #[test]
    fn insecure_random_needs_security_context() {
        let hot = "String token = Long.toString(new Random().nextLong());\n";
        assert!(rules_of(&scan_java(hot)).contains(&"java-insecure-random"));

        let cold = "int jitter = new Random().nextInt(100);\n";
        assert!(!rules_of(&scan_java(cold)).contains(&"java-insecure-random"));
    }

    #[test]
    fn plain_http_skips_localhost() {
        let hot = "URL url = new URL(\"http://api.example.com/v1\");\n";
        assert!(rules_of(&scan_java(hot)).contains(&"java-plain-http"));

        let cold = "URL url = new URL(\"http://localhost:8080/health\");\n";
        assert!(!rules_of(&scan_java(cold)).contains(&"java-plain-http"));
    }
}
