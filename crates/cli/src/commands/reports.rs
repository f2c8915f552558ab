//! `ciglue reports` — normalize raw test reports.
//!
//! Loads report files matching a glob, parses each into the unified
//! suite/group/case tree and emits the result as JSON. A parse failure is
//! fatal for that file but does not stop the others; the command exits
//! non-zero if any file failed.

use ciglue_report::{parse_report, InputProvider, LocalFileProvider, ParseContext, TestRun};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args)]
pub struct ReportsArgs {
    /// Raw report format
    #[arg(long, value_parser = ["mocha-json", "junit-xml"])]
    format: String,

    /// Glob pattern(s) selecting report files under the base directory
    #[arg(long, required = true)]
    glob: Vec<String>,

    /// Directory the globs are expanded against
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Report name the matched files are grouped under
    #[arg(long, default_value = "test-results")]
    name: String,

    /// Working directory prefix to strip from reported file paths
    /// (inferred from the tracked files when omitted)
    #[arg(long)]
    working_dir: Option<String>,

    /// Write the normalized JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct NormalizedReport {
    report: String,
    file: String,
    run: TestRun,
}

pub async fn execute(args: ReportsArgs) -> eyre::Result<()> {
    let format = args.format.parse()?;
    let tracked = tracked_files(&args.base_dir).await;

    let provider =
        LocalFileProvider::new(&args.name, args.glob.clone(), &args.base_dir, tracked)?;
    let raw_reports = provider.load().await?;

    let mut normalized = Vec::new();
    let mut failures = 0usize;

    for raw in &raw_reports {
        let mut ctx = ParseContext::new(provider.tracked_files().to_vec());
        if let Some(working_dir) = &args.working_dir {
            ctx = ctx.with_working_dir(working_dir.clone());
        }

        for (file, content) in &raw.files {
            match parse_report(format, file, content, &mut ctx) {
                Ok(run) => normalized.push(NormalizedReport {
                    report: raw.name.clone(),
                    file: file.clone(),
                    run,
                }),
                Err(e) => {
                    // One bad report file must not hide the others
                    tracing::error!(file = %file, error = %e, "failed to parse report");
                    failures += 1;
                }
            }
        }
    }

    let json = serde_json::to_string_pretty(&normalized)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    if failures > 0 {
        eyre::bail!("{failures} report file(s) failed to parse");
    }
    Ok(())
}

/// Tracked files from local version-control metadata. Failure to consult
/// git only disables relativization and source attribution.
async fn tracked_files(base_dir: &PathBuf) -> Vec<String> {
    let output = tokio::process::Command::new("git")
        .arg("ls-files")
        .current_dir(base_dir)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Ok(output) => {
            tracing::warn!(
                status = %output.status,
                "git ls-files failed; continuing without tracked files"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "git not available; continuing without tracked files");
            Vec::new()
        }
    }
}
