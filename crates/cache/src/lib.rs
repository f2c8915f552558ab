//! Cache-aware build execution: content fingerprinting over path sets,
//! restore/save against a cache backend, and the cache-or-build
//! orchestration that ties them to the command runner.
//!
//! Caching here is strictly an optimization layer. A backend failure is
//! never allowed to fail a build that would otherwise succeed, and a
//! fingerprint mismatch always falls through to a real build.

pub mod client;
pub mod hashing;
pub mod orchestrator;

pub use self::{
    client::{CacheClient, HttpCacheClient, LocalDiskCache},
    hashing::{compute_fingerprint, compute_fingerprint_with, FingerprintOptions},
    orchestrator::{BuildOrchestrator, BuildOutcome, HashFailurePolicy},
};
