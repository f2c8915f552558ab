//! Test report ingestion and normalization.
//!
//! Raw test-result files arrive from the local filesystem or a remote CI
//! artifact store, in one of several tool-specific formats. Everything is
//! parsed into one unified suite/group/case tree ([`model::TestRun`]) that
//! downstream reporting consumes, with failing cases attributed to tracked
//! source lines where a stack frame can be matched.

pub mod locator;
pub mod model;
pub mod parser;
pub mod provider;

pub use self::{
    locator::{locate, SourceLocation},
    model::{Outcome, RawReport, TestCase, TestCaseError, TestGroup, TestRun, TestSuite},
    parser::{parse_report, ParseContext, ReportFormat},
    provider::{ArtifactMatcher, ArtifactProvider, InputProvider, LocalFileProvider},
};
