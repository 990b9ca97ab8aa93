//! Failure reports for transcoder runs that exit nonzero.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A leading line followed by one or more lines indented by at least two
/// spaces. Matches the version/configuration banner the transcoder prints
/// before anything useful.
static LEADING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\r\n]+(?:[\r\n]+ {2}[^\r\n]+)+").expect("valid banner pattern")
});

/// Everything needed to explain a failed job to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Process exit code. Signal deaths are reported as `128 + signal`.
    pub code: i32,
    /// The full command line used to invoke the transcoder.
    pub command: String,
    /// Diagnostic output with the leading indented block removed.
    pub stderr: String,
}

impl FailureReport {
    /// Build a report, stripping the leading banner from `stderr`.
    pub fn new(code: i32, command: impl Into<String>, stderr: &str) -> Self {
        Self {
            code,
            command: command.into(),
            stderr: strip_leading_block(stderr),
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transcode error (exit code {})", self.code)?;
        writeln!(f, "======================")?;
        writeln!(f, "cmd: {}", self.command)?;
        writeln!(f, "--------------------------------------------")?;
        write!(f, "{}", self.stderr)
    }
}

/// Trim `text` and drop a leading line together with its indented
/// continuation lines.
///
/// Only the block at the very start is removed; indented blocks further
/// down are kept.
pub fn strip_leading_block(text: &str) -> String {
    LEADING_BLOCK.replace(text.trim(), "").trim().to_string()
}
