//! The normalized test-result model: run → suite → group → case.
//!
//! Insertion order is preserved at every level while a report is being
//! assembled; suites are sorted by path as a final normalization step so
//! repeated parses of the same input are directly comparable.

use serde::{Deserialize, Serialize};

/// A raw report as produced by an input provider: a report name plus the
/// ordered `(file path, file content)` pairs belonging to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    pub name: String,
    pub files: Vec<(String, String)>,
}

/// Execution outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Skipped,
}

/// Source attribution for a failing case. `path` and `line` stay empty when
/// no stack frame could be matched against the tracked files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseError {
    pub path: String,
    pub line: u32,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TestCaseError>,
}

/// A describe-block level grouping. `name` is `None` for the unnamed root
/// group of a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestGroup {
    pub name: Option<String>,
    pub cases: Vec<TestCase>,
}

/// All groups originating from one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub path: String,
    pub groups: Vec<TestGroup>,
}

/// Root of the normalized model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub duration_ms: f64,
    pub suites: Vec<TestSuite>,
}

impl TestRun {
    #[must_use]
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            suites: Vec::new(),
        }
    }

    /// Append a case to the suite/group it belongs to, creating the suite
    /// and group on first sight. Insertion order is preserved.
    pub fn push_case(&mut self, suite_path: &str, group: Option<&str>, case: TestCase) {
        let suite_index = match self.suites.iter().position(|s| s.path == suite_path) {
            Some(index) => index,
            None => {
                self.suites.push(TestSuite {
                    path: suite_path.to_string(),
                    groups: Vec::new(),
                });
                self.suites.len() - 1
            }
        };
        let suite = &mut self.suites[suite_index];

        let group_index = match suite.groups.iter().position(|g| g.name.as_deref() == group) {
            Some(index) => index,
            None => {
                suite.groups.push(TestGroup {
                    name: group.map(String::from),
                    cases: Vec::new(),
                });
                suite.groups.len() - 1
            }
        };
        suite.groups[group_index].cases.push(case);
    }

    /// Final normalization: order suites deterministically by path.
    pub fn sort_suites(&mut self) {
        self.suites.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Total number of cases across all suites and groups.
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.suites
            .iter()
            .flat_map(|s| &s.groups)
            .map(|g| g.cases.len())
            .sum()
    }
}
