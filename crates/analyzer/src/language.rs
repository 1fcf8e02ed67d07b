// Language routing: extension first, then a content sniff, then javascript.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Go,
    Ruby,
    Php,
    CSharp,
    Cpp,
}

static JAVA_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(package\s+[\w.]+\s*;|(public\s+)?(final\s+|abstract\s+)?class\s+\w+)")
        .expect("java signature pattern")
});

static PYTHON_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(import\s+\w+|from\s+[\w.]+\s+import\b|def\s+\w+\s*\()")
        .expect("python signature pattern")
});

impl Language {
    /// Map a file extension to a language; `None` for unknown extensions.
    fn from_extension(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            "cs" => Some(Language::CSharp),
            "c" | "cpp" | "h" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Resolve the language for a file. Extension wins; otherwise a content
    /// sniff for Java/Python signatures; javascript as the last resort.
    pub fn detect(file_name: &str, content: &str) -> Self {
        if let Some(language) = Self::from_extension(file_name) {
            return language;
        }
        if JAVA_SIGNATURE.is_match(content) {
            return Language::Java;
        }
        if PYTHON_SIGNATURE.is_match(content) {
            return Language::Python;
        }
        Language::JavaScript
    }

    /// Languages that get the full detector set (async/semantic/auth stages
    /// and the external linter).
    pub fn is_js_like(&self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::CSharp => "csharp",
            Language::Cpp => "cpp",
        }
    }
}
