//! Cache-or-build orchestration.
//!
//! Linear flow with no backtracking: validate, fingerprint, attempt a
//! restore, then either report the hit or run the build commands and save
//! the result. Cache failures never fail the run; only configuration
//! errors, a strict-mode hashing failure, or a failing build command do.

use crate::client::CacheClient;
use crate::hashing::{compute_fingerprint, FingerprintOptions};
use ciglue_core::{CommandSpec, Error, PathSet, Result};
use ciglue_runner::{CommandRunner, OutputSink};
use std::sync::Arc;

/// What to do when the input paths cannot be fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFailurePolicy {
    /// Abort the run: nothing can be safely restored or cached.
    #[default]
    Abort,
    /// Warn, skip both restore and save, and run the build uncached.
    BuildWithoutCache,
}

/// Result of a cache-aware build execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Cache key used (hit) or created (successful save). `None` when the
    /// run was degraded to an uncached build or the save failed.
    pub cache_key: Option<String>,
    /// Whether the build was skipped because of a cache hit.
    pub cache_hit: bool,
}

/// Composes the hasher, a cache backend and the command runner into the
/// cache-or-build decision.
pub struct BuildOrchestrator {
    client: Arc<dyn CacheClient>,
    runner: CommandRunner,
    options: FingerprintOptions,
    hash_failure: HashFailurePolicy,
}

impl BuildOrchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn CacheClient>, runner: CommandRunner) -> Self {
        Self {
            client,
            runner,
            options: FingerprintOptions::default(),
            hash_failure: HashFailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_fingerprint_options(mut self, options: FingerprintOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_hash_failure_policy(mut self, policy: HashFailurePolicy) -> Self {
        self.hash_failure = policy;
        self
    }

    /// Execute the cache-or-build flow.
    ///
    /// Configuration errors and build failures propagate; cache backend
    /// failures degrade (restore failure is a miss, save failure only
    /// warns). A stale result is impossible: anything but an exact
    /// fingerprint hit falls through to a real build.
    pub async fn execute(
        &self,
        paths: &PathSet,
        commands: &[CommandSpec],
        sink: &mut dyn OutputSink,
    ) -> Result<BuildOutcome> {
        if commands.is_empty() {
            return Err(Error::configuration("no build commands supplied"));
        }
        if paths.is_empty() {
            return Err(Error::configuration("no input paths supplied"));
        }

        let key = match compute_fingerprint(paths, &self.options) {
            Ok(key) => key,
            Err(e) => match self.hash_failure {
                HashFailurePolicy::Abort => return Err(e),
                HashFailurePolicy::BuildWithoutCache => {
                    tracing::warn!(error = %e, "fingerprinting failed; building without cache");
                    self.runner.run(commands, sink).await?;
                    return Ok(BuildOutcome {
                        cache_key: None,
                        cache_hit: false,
                    });
                }
            },
        };

        match self.client.restore(paths, &key).await {
            Ok(Some(hit)) => {
                tracing::info!(key = %hit, "cache hit, skipping build");
                return Ok(BuildOutcome {
                    cache_key: Some(hit),
                    cache_hit: true,
                });
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
            }
            Err(e) => {
                // The cache is an optimization, never a correctness
                // dependency: a failed restore is just a miss.
                tracing::warn!(key = %key, error = %e, "cache restore failed, treating as miss");
            }
        }

        self.runner.run(commands, sink).await?;

        match self.client.save(paths, &key).await {
            Ok(saved) => Ok(BuildOutcome {
                cache_key: Some(saved),
                cache_hit: false,
            }),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache save failed, keeping local result");
                Ok(BuildOutcome {
                    cache_key: None,
                    cache_hit: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ciglue_runner::CollectingSink;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scriptable cache backend for orchestration tests.
    #[derive(Default)]
    struct ScriptedCache {
        hit_key: Option<String>,
        fail_restore: bool,
        fail_save: bool,
        restores: AtomicUsize,
        saves: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheClient for ScriptedCache {
        async fn restore(&self, _paths: &PathSet, key: &str) -> Result<Option<String>> {
            self.restores.fetch_add(1, Ordering::SeqCst);
            if self.fail_restore {
                return Err(Error::cache_backend("restore", "backend unavailable"));
            }
            Ok(self.hit_key.as_deref().filter(|k| *k == key).map(String::from))
        }

        async fn save(&self, _paths: &PathSet, key: &str) -> Result<String> {
            if self.fail_save {
                return Err(Error::cache_backend("save", "backend unavailable"));
            }
            self.saves.lock().unwrap().push(key.to_string());
            Ok(key.to_string())
        }
    }

    fn fixture() -> (TempDir, PathSet) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("input.txt"), "data").unwrap();
        let set = PathSet::new(vec![dir.path().to_path_buf()]).unwrap();
        (dir, set)
    }

    fn echo(text: &str) -> CommandSpec {
        CommandSpec {
            cmd: "sh".to_string(),
            args: vec!["-c".to_string(), format!("echo {text}")],
        }
    }

    fn failing() -> CommandSpec {
        CommandSpec {
            cmd: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 1".to_string()],
        }
    }

    #[tokio::test]
    async fn test_empty_commands_fail_before_hashing() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new());
        let mut sink = CollectingSink::default();

        let err = orchestrator
            .execute(&paths, &[], &mut sink)
            .await
            .expect_err("empty command list must fail");
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(cache.restores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_builds_and_saves() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new());
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("built")], &mut sink)
            .await
            .expect("build should succeed");

        assert!(!outcome.cache_hit);
        let saved = cache.saves.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(outcome.cache_key.as_deref(), Some(saved[0].as_str()));
        assert_eq!(sink.stdout, vec!["built"]);
    }

    #[tokio::test]
    async fn test_hit_skips_build() {
        let (_dir, paths) = fixture();
        let key = compute_fingerprint(&paths, &FingerprintOptions::default()).unwrap();
        let cache = Arc::new(ScriptedCache {
            hit_key: Some(key.clone()),
            ..Default::default()
        });
        let orchestrator = BuildOrchestrator::new(cache, CommandRunner::new());
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("never")], &mut sink)
            .await
            .expect("hit should succeed");

        assert!(outcome.cache_hit);
        assert_eq!(outcome.cache_key, Some(key));
        assert!(sink.stdout.is_empty(), "build must not run on a hit");
    }

    #[tokio::test]
    async fn test_restore_failure_still_builds() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache {
            fail_restore: true,
            ..Default::default()
        });
        let orchestrator = BuildOrchestrator::new(cache, CommandRunner::new());
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("resilient")], &mut sink)
            .await
            .expect("restore failure must not fail the build");

        assert!(!outcome.cache_hit);
        assert_eq!(sink.stdout, vec!["resilient"]);
    }

    #[tokio::test]
    async fn test_save_failure_is_not_propagated() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache {
            fail_save: true,
            ..Default::default()
        });
        let orchestrator = BuildOrchestrator::new(cache, CommandRunner::new());
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("done")], &mut sink)
            .await
            .expect("save failure must not fail the run");

        assert!(!outcome.cache_hit);
        assert_eq!(outcome.cache_key, None);
        assert_eq!(sink.stdout, vec!["done"]);
    }

    #[tokio::test]
    async fn test_build_failure_skips_save() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new());
        let mut sink = CollectingSink::default();

        let err = orchestrator
            .execute(&paths, &[failing()], &mut sink)
            .await
            .expect_err("failing build must propagate");

        assert!(matches!(err, Error::CommandExecution { .. }));
        assert!(cache.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hash_failure_abort_policy() {
        let paths = PathSet::new(vec![PathBuf::from("/nonexistent/ciglue/inputs")]).unwrap();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new());
        let mut sink = CollectingSink::default();

        let err = orchestrator
            .execute(&paths, &[echo("never")], &mut sink)
            .await
            .expect_err("abort policy must propagate hashing failure");

        assert!(matches!(err, Error::Hashing { .. }));
        assert!(sink.stdout.is_empty());
        assert_eq!(cache.restores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hash_failure_lenient_policy_builds_uncached() {
        let paths = PathSet::new(vec![PathBuf::from("/nonexistent/ciglue/inputs")]).unwrap();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new())
            .with_hash_failure_policy(HashFailurePolicy::BuildWithoutCache);
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("degraded")], &mut sink)
            .await
            .expect("lenient policy must build");

        assert_eq!(outcome.cache_key, None);
        assert!(!outcome.cache_hit);
        assert_eq!(sink.stdout, vec!["degraded"]);
        assert_eq!(cache.restores.load(Ordering::SeqCst), 0, "restore skipped");
        assert!(cache.saves.lock().unwrap().is_empty(), "save skipped");
    }

    #[tokio::test]
    async fn test_prefix_flows_into_cache_key() {
        let (_dir, paths) = fixture();
        let cache = Arc::new(ScriptedCache::default());
        let orchestrator = BuildOrchestrator::new(cache.clone(), CommandRunner::new())
            .with_fingerprint_options(FingerprintOptions::with_prefix("ci-linux"));
        let mut sink = CollectingSink::default();

        let outcome = orchestrator
            .execute(&paths, &[echo("ok")], &mut sink)
            .await
            .expect("build should succeed");

        let key = outcome.cache_key.expect("key should be present");
        assert!(key.starts_with("ci-linux-"));
    }
}
