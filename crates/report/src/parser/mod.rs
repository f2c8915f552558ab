//! Report parsers: one per raw format, dispatched by a format
//! discriminator rather than open subclassing. Each parser maps its
//! native schema into the common [`TestRun`] tree using the shared
//! normalization rules in [`ParseContext`].

mod junit;
mod mocha;

use crate::model::TestRun;
use ciglue_core::{Error, Result};
use std::str::FromStr;

/// The raw report formats the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Mocha's `json` reporter output: `stats` + `passes`/`failures`/`pending`.
    MochaJson,
    /// JUnit-style `testsuites/testsuite/testcase` XML.
    JUnitXml,
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mocha-json" => Ok(Self::MochaJson),
            "junit-xml" => Ok(Self::JUnitXml),
            other => Err(Error::configuration(format!(
                "unknown report format '{other}' (expected 'mocha-json' or 'junit-xml')"
            ))),
        }
    }
}

/// Per-parse-session state shared by all parsers.
///
/// Holds the tracked-file set used for suite relativization and failure
/// attribution, and caches the inferred working directory: the first file
/// path seen in a report determines it for the whole session.
#[derive(Debug, Clone)]
pub struct ParseContext {
    tracked_files: Vec<String>,
    working_dir: Option<String>,
    inferred: bool,
}

impl ParseContext {
    #[must_use]
    pub fn new(tracked_files: Vec<String>) -> Self {
        Self {
            tracked_files,
            working_dir: None,
            inferred: false,
        }
    }

    /// Supply the working directory explicitly instead of inferring it.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = Some(normalize_separators(&working_dir.into()));
        self.inferred = true;
        self
    }

    #[must_use]
    pub fn tracked_files(&self) -> &[String] {
        &self.tracked_files
    }

    /// Normalize a raw file path from a report: forward slashes, lowercase,
    /// and relative to the working directory prefix. The first path seen
    /// infers the working directory for the rest of the session.
    pub fn relativize(&mut self, raw_path: &str) -> String {
        let normalized = normalize_separators(raw_path).to_lowercase();

        if !self.inferred {
            self.working_dir = infer_working_dir(&normalized, &self.tracked_files);
            self.inferred = true;
        }

        match &self.working_dir {
            Some(prefix) => {
                let prefix_lower = prefix.to_lowercase();
                normalized
                    .strip_prefix(&prefix_lower)
                    .map(|rest| rest.trim_start_matches('/').to_string())
                    .unwrap_or(normalized)
            }
            None => normalized,
        }
    }
}

/// Longest common path prefix between a sample report path and the tracked
/// file set: the tracked file that forms the longest suffix of the sample
/// determines where the repository root sits inside the reported paths.
fn infer_working_dir(sample: &str, tracked_files: &[String]) -> Option<String> {
    let mut best: Option<String> = None;
    for tracked in tracked_files {
        let suffix = normalize_separators(tracked).to_lowercase();
        if suffix.is_empty() {
            continue;
        }
        let matches = sample == suffix
            || sample
                .strip_suffix(&suffix)
                .is_some_and(|prefix| prefix.ends_with('/'));
        if matches {
            let prefix_len = sample.len() - suffix.len();
            let prefix = sample[..prefix_len].trim_end_matches('/').to_string();
            let is_better = best
                .as_ref()
                .map(|b| prefix.len() < b.len())
                .unwrap_or(true);
            if is_better {
                best = Some(prefix);
            }
        }
    }
    best
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Derive a group name from a test's fully-qualified and simple names.
///
/// When the fully-qualified name differs from the simple name by more than
/// the simple name's own suffix, the trimmed prefix names the group;
/// otherwise the test belongs to the unnamed root group.
pub(crate) fn derive_group(full_title: &str, title: &str) -> Option<String> {
    match full_title.strip_suffix(title) {
        Some(prefix) => {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                None
            } else {
                Some(prefix.to_string())
            }
        }
        None => None,
    }
}

/// Parse one raw report file into the normalized model.
///
/// A structurally invalid payload is a hard error naming `path`; the caller
/// decides whether sibling report files continue to be processed. Suites in
/// the returned run are sorted by path.
pub fn parse_report(
    format: ReportFormat,
    path: &str,
    content: &str,
    ctx: &mut ParseContext,
) -> Result<TestRun> {
    let mut run = match format {
        ReportFormat::MochaJson => mocha::parse(path, content, ctx)?,
        ReportFormat::JUnitXml => junit::parse(path, content, ctx)?,
    };
    run.sort_suites();
    Ok(run)
}
