//! Parser for JUnit-style XML reports.
//!
//! The native schema is `testsuites/testsuite/testcase` with `classname`,
//! `name`, `time` and optional `file` attributes, plus optional `failure`
//! and `skipped` child elements. `classname` supplies the group name and
//! `file` (case-level, falling back to suite-level) the suite path.

use super::ParseContext;
use crate::locator;
use crate::model::{Outcome, TestCase, TestCaseError, TestRun};
use ciglue_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JUnitReport {
    #[serde(rename = "@time", default)]
    time: Option<f64>,
    #[serde(rename = "testsuite", default)]
    suites: Vec<JUnitSuite>,
}

#[derive(Debug, Deserialize)]
struct JUnitSuite {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@file", default)]
    file: Option<String>,
    #[serde(rename = "@time", default)]
    time: Option<f64>,
    #[serde(rename = "testcase", default)]
    cases: Vec<JUnitCase>,
}

#[derive(Debug, Deserialize)]
struct JUnitCase {
    #[serde(rename = "@classname", default)]
    classname: Option<String>,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@time", default)]
    time: Option<f64>,
    #[serde(rename = "@file", default)]
    file: Option<String>,
    #[serde(default)]
    failure: Option<JUnitFailure>,
    #[serde(default)]
    skipped: Option<JUnitSkipped>,
}

#[derive(Debug, Default, Deserialize)]
struct JUnitFailure {
    #[serde(rename = "@message", default)]
    message: Option<String>,
    #[serde(rename = "$text", default)]
    body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JUnitSkipped {}

pub(super) fn parse(path: &str, content: &str, ctx: &mut ParseContext) -> Result<TestRun> {
    let report: JUnitReport = quick_xml::de::from_str(content)
        .map_err(|e| Error::report_parse(path, format!("invalid JUnit XML: {e}")))?;

    // JUnit times are in seconds; sum suite times when the root carries none
    let total_seconds = report
        .time
        .unwrap_or_else(|| report.suites.iter().filter_map(|s| s.time).sum());
    let mut run = TestRun::new(total_seconds * 1000.0);

    for suite in &report.suites {
        for case in &suite.cases {
            push_case(&mut run, path, suite, case, ctx);
        }
    }

    Ok(run)
}

fn push_case(
    run: &mut TestRun,
    report_path: &str,
    suite: &JUnitSuite,
    case: &JUnitCase,
    ctx: &mut ParseContext,
) {
    let raw_file = case.file.as_deref().or(suite.file.as_deref());
    let suite_path = match raw_file {
        Some(file) => ctx.relativize(file),
        None => report_path.to_string(),
    };

    // The classname acts as the describe-block label; a classname equal to
    // the case name or the suite name carries no extra nesting.
    let group = case
        .classname
        .as_deref()
        .filter(|c| !c.is_empty() && *c != case.name && Some(*c) != suite.name.as_deref())
        .map(String::from);

    let (outcome, error) = match (&case.failure, &case.skipped) {
        (Some(failure), _) => (Outcome::Failed, Some(attribute_failure(failure, ctx))),
        (None, Some(_)) => (Outcome::Skipped, None),
        (None, None) => (Outcome::Success, None),
    };

    run.push_case(
        &suite_path,
        group.as_deref(),
        TestCase {
            name: case.name.clone(),
            outcome,
            duration_ms: case.time.unwrap_or(0.0) * 1000.0,
            error,
        },
    );
}

fn attribute_failure(failure: &JUnitFailure, ctx: &mut ParseContext) -> TestCaseError {
    let details = failure.body.clone().unwrap_or_default();
    let message = failure
        .message
        .clone()
        .or_else(|| details.lines().next().map(String::from))
        .unwrap_or_default();

    let location = {
        let relativize_ctx = ctx.clone();
        let tracked = ctx.tracked_files().to_vec();
        locator::locate(&details, &tracked, &move |p| {
            relativize_ctx.clone().relativize(p)
        })
    };

    match location {
        Some(location) => TestCaseError {
            path: location.path,
            line: location.line,
            message,
            details,
        },
        None => TestCaseError {
            path: String::new(),
            line: 0,
            message,
            details,
        },
    }
}
