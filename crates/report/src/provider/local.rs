//! Local-filesystem input provider.
//!
//! Expands one or more glob patterns against a base directory, reads every
//! match as text and groups all of them under a single report name. The
//! tracked-file list comes from the caller (version-control metadata is an
//! external collaborator).

use super::InputProvider;
use crate::model::RawReport;
use async_trait::async_trait;
use ciglue_core::{Error, Result};
use globset::{Glob, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalFileProvider {
    report_name: String,
    patterns: Vec<String>,
    base_dir: PathBuf,
    tracked_files: Vec<String>,
}

impl LocalFileProvider {
    pub fn new(
        report_name: impl Into<String>,
        patterns: Vec<String>,
        base_dir: impl Into<PathBuf>,
        tracked_files: Vec<String>,
    ) -> Result<Self> {
        if patterns.is_empty() {
            return Err(Error::configuration(
                "local report provider needs at least one glob pattern",
            ));
        }
        Ok(Self {
            report_name: report_name.into(),
            patterns,
            base_dir: base_dir.into(),
            tracked_files,
        })
    }
}

#[async_trait]
impl InputProvider for LocalFileProvider {
    async fn load(&self) -> Result<Vec<RawReport>> {
        let mut files = Vec::new();
        for pattern in &self.patterns {
            let mut matches = expand_glob(pattern, &self.base_dir)?;
            matches.sort();
            for path in matches {
                let content = fs::read_to_string(&path)
                    .map_err(|e| Error::file_system(&path, "read report file", e))?;
                files.push((path.to_string_lossy().into_owned(), content));
            }
        }

        if files.is_empty() {
            tracing::warn!(
                report = %self.report_name,
                patterns = ?self.patterns,
                "no report files matched"
            );
            return Ok(Vec::new());
        }

        Ok(vec![RawReport {
            name: self.report_name.clone(),
            files,
        }])
    }

    fn tracked_files(&self) -> &[String] {
        &self.tracked_files
    }
}

/// Expand a glob pattern under a base directory. A pattern without glob
/// metacharacters is treated as a direct file path.
pub(crate) fn expand_glob(pattern: &str, base_dir: &Path) -> Result<Vec<PathBuf>> {
    if !pattern.contains('*') && !pattern.contains('?') && !pattern.contains('[') {
        let full_path = base_dir.join(pattern);
        return if full_path.is_file() {
            Ok(vec![full_path])
        } else {
            Ok(Vec::new())
        };
    }

    let glob = Glob::new(pattern)
        .map_err(|e| Error::configuration(format!("invalid glob pattern '{pattern}': {e}")))?;
    let mut builder = GlobSetBuilder::new();
    builder.add(glob);
    let globset = builder
        .build()
        .map_err(|e| Error::configuration(format!("failed to build globset: {e}")))?;

    let mut files = Vec::new();
    walk_for_glob(base_dir, base_dir, &globset, &mut files)?;
    Ok(files)
}

fn walk_for_glob(
    dir: &Path,
    base_dir: &Path,
    globset: &globset::GlobSet,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // A base dir that does not exist simply matches nothing
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::file_system(dir, "read directory", e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| Error::file_system(dir, "read directory entry", e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| Error::file_system(&path, "get file type", e))?;

        if file_type.is_file() {
            let relative = path.strip_prefix(base_dir).unwrap_or(&path);
            if globset.is_match(relative) {
                files.push(path);
            }
        } else if file_type.is_dir() {
            walk_for_glob(&path, base_dir, globset, files)?;
        }
        // Symlinks are skipped to keep traversal inside the base directory
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_groups_all_matches_under_one_report() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("alpha.json"), "{}").unwrap();
        fs::write(dir.path().join("sub/beta.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let provider = LocalFileProvider::new(
            "unit-tests",
            vec!["**/*.json".to_string()],
            dir.path(),
            Vec::new(),
        )
        .unwrap();

        let reports = provider.load().await.expect("load should succeed");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "unit-tests");
        assert_eq!(reports[0].files.len(), 2);
        assert!(reports[0].files.iter().all(|(p, _)| p.ends_with(".json")));
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let provider = LocalFileProvider::new(
            "unit-tests",
            vec!["*.json".to_string()],
            dir.path(),
            Vec::new(),
        )
        .unwrap();

        let reports = provider.load().await.expect("load should succeed");
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_direct_path_pattern() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.xml"), "<x/>").unwrap();

        let provider = LocalFileProvider::new(
            "xml",
            vec!["report.xml".to_string()],
            dir.path(),
            Vec::new(),
        )
        .unwrap();

        let reports = provider.load().await.expect("load should succeed");
        assert_eq!(reports[0].files.len(), 1);
    }

    #[test]
    fn test_empty_patterns_rejected() {
        let result = LocalFileProvider::new("r", Vec::new(), "/tmp", Vec::new());
        assert!(result.is_err());
    }
}
