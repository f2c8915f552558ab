//! `ciglue run` — cache-aware build execution.
//!
//! Fingerprints the input paths, asks the cache backend for a prior build
//! keyed by that fingerprint, and only runs the build commands on a miss.
//! Cache trouble degrades to a normal build; only configuration errors and
//! failing commands abort with a non-zero exit.

use ciglue_cache::{
    BuildOrchestrator, CacheClient, FingerprintOptions, HashFailurePolicy, HttpCacheClient,
    LocalDiskCache,
};
use ciglue_core::{CommandSpec, PathSet};
use ciglue_runner::{CommandRunner, ConsoleSink};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Input paths to fingerprint and cache, whitespace- or
    /// newline-delimited
    #[arg(long, conflicts_with = "paths_file")]
    paths: Option<String>,

    /// File containing the input paths, one per line
    #[arg(long)]
    paths_file: Option<PathBuf>,

    /// File with the build commands: a JSON array of
    /// {"cmd", "cmdParams"} objects, or one command line per line
    #[arg(long)]
    commands_file: PathBuf,

    /// Directory for the local disk cache (default: the user cache dir)
    #[arg(long, conflicts_with = "cache_url")]
    cache_dir: Option<PathBuf>,

    /// Base URL of a shared HTTP cache service
    #[arg(long)]
    cache_url: Option<String>,

    /// Cache-key prefix (default: the OS identifier)
    #[arg(long)]
    prefix: Option<String>,

    /// Build without caching when the inputs cannot be fingerprinted,
    /// instead of aborting
    #[arg(long)]
    lenient_hash: bool,

    /// Overall build deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

pub async fn execute(args: RunArgs) -> eyre::Result<()> {
    let paths = match (&args.paths, &args.paths_file) {
        (Some(inline), _) => PathSet::parse(inline)?,
        (None, Some(file)) => PathSet::parse(&std::fs::read_to_string(file)?)?,
        (None, None) => eyre::bail!("either --paths or --paths-file is required"),
    };

    let raw_commands = std::fs::read_to_string(&args.commands_file)?;
    let commands = parse_commands(&raw_commands)?;

    let client: Arc<dyn CacheClient> = match &args.cache_url {
        Some(url) => Arc::new(HttpCacheClient::new(url.clone())),
        None => {
            let dir = match &args.cache_dir {
                Some(dir) => dir.clone(),
                None => default_cache_dir()?,
            };
            Arc::new(LocalDiskCache::new(dir))
        }
    };

    let mut runner = CommandRunner::new();
    if let Some(secs) = args.timeout_secs {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }

    let options = match &args.prefix {
        Some(prefix) => FingerprintOptions::with_prefix(prefix.clone()),
        None => FingerprintOptions::default(),
    };
    let policy = if args.lenient_hash {
        HashFailurePolicy::BuildWithoutCache
    } else {
        HashFailurePolicy::Abort
    };

    let orchestrator = BuildOrchestrator::new(client, runner)
        .with_fingerprint_options(options)
        .with_hash_failure_policy(policy);

    let mut sink = ConsoleSink;
    let outcome = orchestrator.execute(&paths, &commands, &mut sink).await?;

    match (&outcome.cache_key, outcome.cache_hit) {
        (Some(key), true) => tracing::info!(key = %key, "restored from cache, build skipped"),
        (Some(key), false) => tracing::info!(key = %key, "build complete, result cached"),
        (None, _) => tracing::info!("build complete (not cached)"),
    }

    Ok(())
}

/// The structured JSON list is canonical; a commands file that is not JSON
/// is read as the legacy one-command-per-line form.
fn parse_commands(raw: &str) -> eyre::Result<Vec<CommandSpec>> {
    if raw.trim_start().starts_with('[') {
        Ok(CommandSpec::parse_list(raw)?)
    } else {
        Ok(CommandSpec::parse_script(raw)?)
    }
}

fn default_cache_dir() -> eyre::Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("ciglue"))
        .ok_or_else(|| eyre::eyre!("could not determine a cache directory; pass --cache-dir"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_json_form() {
        let commands = parse_commands(r#"[{"cmd": "make", "cmdParams": ["all"]}]"#).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].cmd, "make");
    }

    #[test]
    fn test_parse_commands_script_form() {
        let commands = parse_commands("make all\nmake install\n").unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].args, vec!["install".to_string()]);
    }
}
