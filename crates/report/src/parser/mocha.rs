//! Parser for mocha's `json` reporter output.
//!
//! The native schema is a single JSON document with `stats.duration` and
//! three flat test arrays (`passes`, `failures`, `pending`). Suite and
//! group structure is reconstructed from each test's `file` and
//! `fullTitle`/`title` pair.

use super::{derive_group, ParseContext};
use crate::locator;
use crate::model::{Outcome, TestCase, TestCaseError, TestRun};
use ciglue_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MochaReport {
    #[serde(default)]
    stats: MochaStats,
    #[serde(default)]
    passes: Vec<MochaTest>,
    #[serde(default)]
    failures: Vec<MochaTest>,
    #[serde(default)]
    pending: Vec<MochaTest>,
}

#[derive(Debug, Default, Deserialize)]
struct MochaStats {
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct MochaTest {
    title: String,
    #[serde(rename = "fullTitle")]
    full_title: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    err: Option<MochaError>,
}

#[derive(Debug, Default, Deserialize)]
struct MochaError {
    #[serde(default)]
    stack: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(super) fn parse(path: &str, content: &str, ctx: &mut ParseContext) -> Result<TestRun> {
    let report: MochaReport = serde_json::from_str(content)
        .map_err(|e| Error::report_parse(path, format!("invalid mocha JSON: {e}")))?;

    let mut run = TestRun::new(report.stats.duration);
    for test in &report.passes {
        push_test(&mut run, path, test, Outcome::Success, ctx);
    }
    for test in &report.failures {
        push_test(&mut run, path, test, Outcome::Failed, ctx);
    }
    for test in &report.pending {
        push_test(&mut run, path, test, Outcome::Skipped, ctx);
    }

    Ok(run)
}

fn push_test(
    run: &mut TestRun,
    report_path: &str,
    test: &MochaTest,
    outcome: Outcome,
    ctx: &mut ParseContext,
) {
    let suite_path = match &test.file {
        Some(file) => ctx.relativize(file),
        // A test without a file attribute falls back to the report file
        None => report_path.to_string(),
    };
    let group = derive_group(&test.full_title, &test.title);

    let error = match (outcome, &test.err) {
        (Outcome::Failed, Some(err)) => Some(attribute_error(err, ctx)),
        (Outcome::Failed, None) => Some(TestCaseError::default()),
        _ => None,
    };

    run.push_case(
        &suite_path,
        group.as_deref(),
        TestCase {
            name: test.title.clone(),
            outcome,
            duration_ms: test.duration.unwrap_or(0.0),
            error,
        },
    );
}

/// Resolve the failure's stack trace to a tracked `(path, line)` pair where
/// possible; the raw message and stack are kept either way.
fn attribute_error(err: &MochaError, ctx: &mut ParseContext) -> TestCaseError {
    let stack = err.stack.clone().unwrap_or_default();
    let message = err.message.clone().unwrap_or_default();

    let location = {
        let relativize_ctx = ctx.clone();
        let tracked = ctx.tracked_files().to_vec();
        locator::locate(&stack, &tracked, &move |p| {
            relativize_ctx.clone().relativize(p)
        })
    };

    match location {
        Some(location) => TestCaseError {
            path: location.path,
            line: location.line,
            message,
            details: stack,
        },
        None => TestCaseError {
            path: String::new(),
            line: 0,
            message,
            details: stack,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_report, ReportFormat};

    const ROUND_TRIP: &str = r#"{
        "stats": { "duration": 1234.5 },
        "passes": [
            { "title": "t1", "fullTitle": "Suite t1", "file": "a/b.js", "duration": 12 }
        ],
        "failures": [
            {
                "title": "t2",
                "fullTitle": "Suite t2",
                "file": "a/b.js",
                "err": { "message": "boom" }
            }
        ],
        "pending": []
    }"#;

    #[test]
    fn test_round_trip_scenario() {
        let mut ctx = ParseContext::new(Vec::new());
        let run =
            parse_report(ReportFormat::MochaJson, "report.json", ROUND_TRIP, &mut ctx)
                .expect("should parse");

        assert_eq!(run.duration_ms, 1234.5);
        assert_eq!(run.suites.len(), 1);
        assert_eq!(run.suites[0].path, "a/b.js");
        assert_eq!(run.suites[0].groups.len(), 1);

        let group = &run.suites[0].groups[0];
        assert_eq!(group.name.as_deref(), Some("Suite"));
        assert_eq!(group.cases.len(), 2);

        assert_eq!(group.cases[0].name, "t1");
        assert_eq!(group.cases[0].outcome, Outcome::Success);
        assert_eq!(group.cases[1].name, "t2");
        assert_eq!(group.cases[1].outcome, Outcome::Failed);
        let error = group.cases[1].error.as_ref().expect("failure has error");
        assert_eq!(error.message, "boom");
        assert!(error.path.is_empty());
    }

    #[test]
    fn test_pending_maps_to_skipped() {
        let content = r#"{
            "stats": { "duration": 1 },
            "passes": [],
            "failures": [],
            "pending": [ { "title": "later", "fullTitle": "later", "file": "x.js" } ]
        }"#;
        let mut ctx = ParseContext::new(Vec::new());
        let run = parse(
            "report.json",
            content,
            &mut ctx,
        )
        .expect("should parse");

        let case = &run.suites[0].groups[0].cases[0];
        assert_eq!(case.outcome, Outcome::Skipped);
        assert_eq!(run.suites[0].groups[0].name, None);
    }

    #[test]
    fn test_failure_stack_attribution() {
        let content = r#"{
            "stats": { "duration": 1 },
            "failures": [
                {
                    "title": "t",
                    "fullTitle": "S t",
                    "file": "/ci/repo/test/app.spec.js",
                    "err": {
                        "message": "expected 1 to equal 2",
                        "stack": "AssertionError\n    at ok (/ci/repo/src/app.js:33:5)\n    at run (/ci/repo/test/app.spec.js:9:1)"
                    }
                }
            ]
        }"#;
        let tracked = vec!["src/app.js".to_string(), "test/app.spec.js".to_string()];
        let mut ctx = ParseContext::new(tracked);
        let run = parse("report.json", content, &mut ctx).expect("should parse");

        let error = run.suites[0].groups[0].cases[0]
            .error
            .as_ref()
            .expect("error present");
        assert_eq!(error.path, "src/app.js");
        assert_eq!(error.line, 33);
        assert_eq!(error.message, "expected 1 to equal 2");
    }

    #[test]
    fn test_invalid_json_names_the_report() {
        let mut ctx = ParseContext::new(Vec::new());
        let err = parse("broken.json", "{ not json", &mut ctx).expect_err("must fail");
        assert!(err.to_string().contains("broken.json"));
    }
}
