//! End-to-end cache-or-build flow against the disk cache backend.

use ciglue_cache::{BuildOrchestrator, FingerprintOptions, LocalDiskCache};
use ciglue_core::{CommandSpec, PathSet};
use ciglue_runner::{CollectingSink, CommandRunner};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn echo_command(text: &str) -> CommandSpec {
    CommandSpec {
        cmd: "sh".to_string(),
        args: vec!["-c".to_string(), format!("echo {text}")],
    }
}

fn orchestrator(cache_dir: &TempDir) -> BuildOrchestrator {
    BuildOrchestrator::new(
        Arc::new(LocalDiskCache::new(cache_dir.path())),
        CommandRunner::new(),
    )
    .with_fingerprint_options(FingerprintOptions::with_prefix("test"))
}

#[tokio::test]
async fn second_run_with_unchanged_inputs_is_a_hit() {
    let cache_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    fs::write(data_dir.path().join("source.txt"), "v1").unwrap();
    let paths = PathSet::new(vec![data_dir.path().to_path_buf()]).unwrap();
    let commands = [echo_command("building")];

    // First run: miss, builds, saves
    let mut sink = CollectingSink::default();
    let first = orchestrator(&cache_dir)
        .execute(&paths, &commands, &mut sink)
        .await
        .expect("first run");
    assert!(!first.cache_hit);
    let key = first.cache_key.clone().expect("saved key");
    assert_eq!(sink.stdout, vec!["building"]);

    // Second run: identical inputs, fresh orchestrator, no build
    let mut sink = CollectingSink::default();
    let second = orchestrator(&cache_dir)
        .execute(&paths, &commands, &mut sink)
        .await
        .expect("second run");
    assert!(second.cache_hit);
    assert_eq!(second.cache_key.as_deref(), Some(key.as_str()));
    assert!(sink.stdout.is_empty());
}

#[tokio::test]
async fn changed_inputs_fall_through_to_a_real_build() {
    let cache_dir = TempDir::new().unwrap();
    let data_dir = TempDir::new().unwrap();
    fs::write(data_dir.path().join("source.txt"), "v1").unwrap();
    let paths = PathSet::new(vec![data_dir.path().to_path_buf()]).unwrap();
    let commands = [echo_command("building")];

    let first = orchestrator(&cache_dir)
        .execute(&paths, &commands, &mut CollectingSink::default())
        .await
        .expect("first run");

    // Any byte change must produce a different key and a rebuild
    fs::write(data_dir.path().join("source.txt"), "v2").unwrap();

    let mut sink = CollectingSink::default();
    let second = orchestrator(&cache_dir)
        .execute(&paths, &commands, &mut sink)
        .await
        .expect("second run");

    assert!(!second.cache_hit);
    assert_ne!(second.cache_key, first.cache_key);
    assert_eq!(sink.stdout, vec!["building"]);
}
