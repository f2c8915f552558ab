//! Stack-trace source attribution.
//!
//! Scans stack-trace-shaped text for `file:line` tokens and resolves the
//! first one that maps onto a tracked source file. Error formats put the
//! innermost frame of the failure first, so first match in trace order is
//! authoritative.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A resolved `(path, line)` pair inside the tracked file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    pub line: u32,
}

/// Matches `path:line` and `path:line:col` tokens inside stack frames,
/// with or without surrounding parentheses or an `at ` prefix. The path
/// must carry a file extension to filter out timestamps and port numbers.
static FRAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9_@~\-./\\]+\.[A-Za-z0-9_]+):(\d+)(?::\d+)?")
        .unwrap_or_else(|e| panic!("invalid frame pattern: {e}"))
});

/// Resolve stack text to the first frame that references a tracked file.
///
/// Each candidate path is passed through `relativize` (the same
/// normalization used for suite paths) before testing membership in
/// `tracked_files`, case-insensitively. Returns `None` when no frame
/// matches; callers must tolerate a missing location.
pub fn locate(
    stack: &str,
    tracked_files: &[String],
    relativize: &dyn Fn(&str) -> String,
) -> Option<SourceLocation> {
    for line in stack.lines() {
        for capture in FRAME_PATTERN.captures_iter(line) {
            let raw_path = capture.get(1)?.as_str();
            let line_number: u32 = capture.get(2)?.as_str().parse().ok()?;

            let candidate = relativize(raw_path);
            let is_tracked = tracked_files
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&candidate));
            if is_tracked {
                return Some(SourceLocation {
                    path: candidate,
                    line: line_number,
                });
            }
        }
    }
    None
}
