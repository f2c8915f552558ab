//! Input providers: sources of raw report files.
//!
//! A provider produces [`RawReport`]s (report name → ordered file
//! contents) and carries the tracked-file list the parsers use for
//! relativization and failure attribution.

mod artifact;
mod local;

use crate::model::RawReport;
use async_trait::async_trait;
use ciglue_core::Result;

pub use self::{
    artifact::{ArtifactInfo, ArtifactMatcher, ArtifactProvider, ArtifactStore, HttpArtifactStore},
    local::LocalFileProvider,
};

/// Source of raw test reports.
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Load all raw reports this provider can see. An empty result is not
    /// an error; providers warn when nothing matched.
    async fn load(&self) -> Result<Vec<RawReport>>;

    /// Files known to version control, used to disambiguate which
    /// stack-trace frames belong to user code.
    fn tracked_files(&self) -> &[String];
}
