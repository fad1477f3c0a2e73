//! Completion marker parsing.
//!
//! The compiler announces finished builds with a plain log line such as
//! `[:app] Build completed. (152 files, 2 compiled, 0 warnings, 1.25s)`.
//! This is the only place that knows the phrasing.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::exec::strip_ansi;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[:([a-z0-9_-]+)\] build completed").expect("valid marker regex")
});

/// Extract the build id from a completion marker line.
pub fn parse_completion_marker(line: &str) -> Option<String> {
    let plain = strip_ansi(line);
    MARKER_RE
        .captures(&plain)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
