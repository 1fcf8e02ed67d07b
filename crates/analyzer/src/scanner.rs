// Line scanner with loop-depth tracking
//
// All detectors see the same per-line view: the text, a 1-based line
// number, the loop depth at that line, and the cumulative brace balance
// after it. Loop exit is detected by net brace balance returning to the
// level recorded at the loop head, which supports nested loops.

use once_cell::sync::Lazy;
use regex::Regex;

static LOOP_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfor\s*\(|\bwhile\s*\(|\.(forEach|map|filter|reduce)\s*\(")
        .expect("loop head pattern")
});

/// One scanned source line.
#[derive(Debug, Clone)]
pub struct ScanLine {
    /// 1-based line number.
    pub number: u32,
    pub text: String,
    /// Number of enclosing loops, counting a loop head line as inside its
    /// own loop (a single-line `for (..) { .. }` body is depth 1).
    pub loop_depth: u32,
    /// Cumulative `{`/`}` balance after this line.
    pub balance_after: i32,
}

impl ScanLine {
    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }
}

/// Shared scan of one file.
#[derive(Debug)]
pub struct FileScan {
    pub lines: Vec<ScanLine>,
}

impl FileScan {
    pub fn build(content: &str) -> Self {
        let mut lines = Vec::new();
        let mut balance: i32 = 0;
        // Entry balance of each currently-open loop.
        let mut loop_stack: Vec<i32> = Vec::new();

        for (idx, text) in content.lines().enumerate() {
            if LOOP_HEAD.is_match(text) {
                loop_stack.push(balance);
            }
            let loop_depth = loop_stack.len() as u32;

            let opens = text.matches('{').count() as i32;
            let closes = text.matches('}').count() as i32;
            balance += opens - closes;

            // A loop is closed once the balance drops back to its entry
            // level. A head with no braces closes at the end of its own
            // line, gating only the head line itself.
            while loop_stack.last().map(|entry| *entry >= balance).unwrap_or(false) {
                loop_stack.pop();
            }

            lines.push(ScanLine {
                number: (idx + 1) as u32,
                text: text.to_string(),
                loop_depth,
                balance_after: balance,
            });
        }

        Self { lines }
    }

    /// `lines_analyzed` metric: newline-delimited segments + 1.
    pub fn line_count(content: &str) -> u64 {
        content.matches('\n').count() as u64 + 1
    }
}
