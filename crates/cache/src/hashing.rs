//! Content fingerprinting for cache keys.
//!
//! A fingerprint is a SHA-256 digest over the recursive content of a
//! [`PathSet`]: per input root a tree digest covering entry names, file
//! bytes and directory structure, concatenated in input order and hashed
//! once more. The result is stable across runs and across directory
//! iteration orders; any byte change inside the tree changes it.

use ciglue_core::{Error, PathSet, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

/// Options controlling fingerprint computation.
#[derive(Debug, Clone, Default)]
pub struct FingerprintOptions {
    /// Prefix prepended to the digest string. Participates in cache-key
    /// disambiguation (different platforms never share entries) but not in
    /// the digest itself. Defaults to the OS identifier.
    pub prefix: Option<String>,
}

impl FingerprintOptions {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn resolved_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(std::env::consts::OS)
    }
}

/// Compute the fingerprint of a path set with the default tree hasher.
///
/// Fails if any path in the set does not exist; the caller decides whether
/// that aborts the run or merely disables caching.
pub fn compute_fingerprint(paths: &PathSet, options: &FingerprintOptions) -> Result<String> {
    compute_fingerprint_with(paths, options, &hash_tree)
}

/// Compute the fingerprint using a caller-supplied per-root digest strategy.
///
/// The default strategy is [`hash_tree`]; tests and embedders with special
/// input layouts can substitute their own. The prefix handling and the
/// final concatenation digest are identical for every strategy.
pub fn compute_fingerprint_with(
    paths: &PathSet,
    options: &FingerprintOptions,
    root_hasher: &dyn Fn(&Path) -> Result<String>,
) -> Result<String> {
    let mut combined = Sha256::new();
    for path in paths {
        if !path.exists() {
            return Err(Error::hashing(path.clone(), "path does not exist"));
        }
        let root_digest = root_hasher(path)?;
        combined.update(root_digest.as_bytes());
    }

    let digest = hex::encode(combined.finalize());
    Ok(format!("{}-{digest}", options.resolved_prefix()))
}

/// Default per-root digest: a deterministic recursive hash of one tree.
///
/// Files digest their name and streamed content; directories digest their
/// name plus the digests of their children, visited in sorted name order so
/// the result does not depend on filesystem iteration order.
pub fn hash_tree(path: &Path) -> Result<String> {
    let metadata = path
        .symlink_metadata()
        .map_err(|e| Error::hashing(path, format!("cannot stat: {e}")))?;

    let mut hasher = Sha256::new();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);

    if metadata.is_file() {
        hash_file_into(path, &mut hasher)?;
    } else if metadata.is_dir() {
        let mut entries: Vec<_> = fs::read_dir(path)
            .map_err(|e| Error::file_system(path, "read directory", e))?
            .collect::<std::io::Result<_>>()
            .map_err(|e| Error::file_system(path, "read directory entry", e))?;
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            let file_type = entry
                .file_type()
                .map_err(|e| Error::file_system(entry.path(), "get file type", e))?;
            // Symlinks are skipped rather than followed, so a link cannot
            // pull content from outside the hashed tree.
            if file_type.is_symlink() {
                continue;
            }
            let child_digest = hash_tree(&entry.path())?;
            hasher.update(child_digest.as_bytes());
        }
    } else {
        // Sockets, fifos and other specials carry no cacheable content.
        return Err(Error::hashing(path, "unsupported file type"));
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Stream a file's bytes into the hasher in fixed-size chunks.
fn hash_file_into(path: &Path, hasher: &mut Sha256) -> Result<()> {
    let file =
        fs::File::open(path).map_err(|e| Error::file_system(path, "open file for hashing", e))?;
    let mut reader = BufReader::with_capacity(8192, file);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| Error::file_system(path, "read file chunk for hashing", e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(())
}
