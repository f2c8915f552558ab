//! Remote CI artifact input provider.
//!
//! Matches build artifacts by exact name or by regex (with capture groups
//! substituted into a report-name template), downloads each match as a zip
//! archive and extracts the entries whose names match a glob. Artifacts are
//! processed one at a time; if two artifacts resolve to the same report
//! name the later one wins.

use super::InputProvider;
use crate::model::RawReport;
use async_trait::async_trait;
use ciglue_core::{Error, Result};
use globset::Glob;
use regex::Regex;
use std::io::{Cursor, Read};

/// One remote build artifact, as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub id: String,
    pub name: String,
}

/// External CI artifact store collaborator.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ArtifactInfo>>;
    async fn download(&self, id: &str) -> Result<Vec<u8>>;
}

/// Artifact store over a plain HTTP listing/download API.
pub struct HttpArtifactStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpArtifactStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ArtifactListing {
    id: String,
    name: String,
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn list(&self) -> Result<Vec<ArtifactInfo>> {
        let url = format!("{}/artifacts", self.base_url);
        let listings: Vec<ArtifactListing> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::network(&url, e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::network(&url, format!("decode listing: {e}")))?;

        Ok(listings
            .into_iter()
            .map(|a| ArtifactInfo {
                id: a.id,
                name: a.name,
            })
            .collect())
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/artifacts/{id}", self.base_url);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::network(&url, e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::network(&url, e.to_string()))?
            .bytes()
            .await
            .map_err(|e| Error::network(&url, format!("read body: {e}")))?;
        Ok(body.to_vec())
    }
}

/// How artifact names select artifacts and name the resulting reports.
pub enum ArtifactMatcher {
    /// The artifact whose name equals the string; the report carries the
    /// same name.
    Exact(String),
    /// Artifacts whose names match the regex; `$1`..`$9` in the template
    /// are replaced with the corresponding capture groups.
    Pattern { regex: Regex, name_template: String },
}

impl ArtifactMatcher {
    pub fn pattern(regex: &str, name_template: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(regex)
            .map_err(|e| Error::configuration(format!("invalid artifact regex '{regex}': {e}")))?;
        Ok(Self::Pattern {
            regex,
            name_template: name_template.into(),
        })
    }

    /// Resolve an artifact name to a report name, or `None` when the
    /// artifact does not match. A template referencing a capture group the
    /// regex does not produce is a hard configuration error.
    pub fn report_name(&self, artifact_name: &str) -> Result<Option<String>> {
        match self {
            Self::Exact(expected) => Ok((artifact_name == expected)
                .then(|| artifact_name.to_string())),
            Self::Pattern {
                regex,
                name_template,
            } => {
                let Some(captures) = regex.captures(artifact_name) else {
                    return Ok(None);
                };
                let mut resolved = String::with_capacity(name_template.len());
                let mut chars = name_template.chars().peekable();
                while let Some(c) = chars.next() {
                    if c != '$' {
                        resolved.push(c);
                        continue;
                    }
                    match chars.peek().and_then(|d| d.to_digit(10)) {
                        Some(index) => {
                            chars.next();
                            let group =
                                captures.get(index as usize).ok_or_else(|| {
                                    Error::configuration(format!(
                                        "report name template '{name_template}' references \
                                         capture group {index}, but the matcher only has {} groups",
                                        regex.captures_len() - 1
                                    ))
                                })?;
                            resolved.push_str(group.as_str());
                        }
                        None => resolved.push(c),
                    }
                }
                Ok(Some(resolved))
            }
        }
    }
}

pub struct ArtifactProvider {
    store: Box<dyn ArtifactStore>,
    matcher: ArtifactMatcher,
    entry_glob: globset::GlobMatcher,
    tracked_files: Vec<String>,
}

impl ArtifactProvider {
    pub fn new(
        store: Box<dyn ArtifactStore>,
        matcher: ArtifactMatcher,
        entry_glob: &str,
        tracked_files: Vec<String>,
    ) -> Result<Self> {
        let entry_glob = Glob::new(entry_glob)
            .map_err(|e| Error::configuration(format!("invalid entry glob '{entry_glob}': {e}")))?
            .compile_matcher();
        Ok(Self {
            store,
            matcher,
            entry_glob,
            tracked_files,
        })
    }

    fn extract(&self, archive_bytes: &[u8], artifact_name: &str) -> Result<Vec<(String, String)>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes)).map_err(|e| {
            Error::report_parse(artifact_name, format!("not a readable zip archive: {e}"))
        })?;

        let mut files = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| {
                Error::report_parse(artifact_name, format!("corrupt archive entry: {e}"))
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if !self.entry_glob.is_match(&name) {
                continue;
            }
            let mut content = String::new();
            entry.read_to_string(&mut content).map_err(|e| {
                Error::report_parse(
                    artifact_name,
                    format!("archive entry '{name}' is not text: {e}"),
                )
            })?;
            files.push((name, content));
        }
        Ok(files)
    }
}

#[async_trait]
impl InputProvider for ArtifactProvider {
    async fn load(&self) -> Result<Vec<RawReport>> {
        let artifacts = self.store.list().await?;

        // Keyed by report name; later artifacts overwrite earlier ones on a
        // name collision (last-writer-wins).
        let mut reports: Vec<RawReport> = Vec::new();
        let mut matched_any = false;

        for artifact in &artifacts {
            let Some(report_name) = self.matcher.report_name(&artifact.name)? else {
                continue;
            };
            matched_any = true;

            let bytes = self.store.download(&artifact.id).await?;
            let files = self.extract(&bytes, &artifact.name)?;
            tracing::debug!(
                artifact = %artifact.name,
                report = %report_name,
                entries = files.len(),
                "extracted artifact"
            );

            match reports.iter_mut().find(|r| r.name == report_name) {
                Some(existing) => existing.files = files,
                None => reports.push(RawReport {
                    name: report_name,
                    files,
                }),
            }
        }

        if !matched_any {
            tracing::warn!("no artifacts matched the configured name");
        }

        Ok(reports)
    }

    fn tracked_files(&self) -> &[String] {
        &self.tracked_files
    }
}
