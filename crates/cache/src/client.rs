//! Cache backends: restore-by-key and save-under-key.
//!
//! The orchestrator only ever sees the [`CacheClient`] trait. Every backend
//! failure surfaces as [`Error::CacheBackend`] so callers can degrade:
//! a failed restore becomes a miss, a failed save is logged and dropped.

use async_trait::async_trait;
use ciglue_core::{Error, PathSet, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Restore/save interface against an external shared-cache store.
///
/// `restore` returns the matched key on a hit and `None` on a miss. Both
/// operations are keyed by the same fingerprint space.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn restore(&self, paths: &PathSet, key: &str) -> Result<Option<String>>;
    async fn save(&self, paths: &PathSet, key: &str) -> Result<String>;
}

/// Manifest written next to a completed disk-cache entry. An entry without
/// a manifest is a partial write and counts as a miss.
#[derive(Debug, Serialize, Deserialize)]
struct EntryManifest {
    key: String,
    roots: Vec<String>,
}

/// Cache backend storing entries as plain directory copies on local disk.
///
/// Layout: `<root>/entries/<key>/<index>/...` with a `manifest.json` at the
/// entry root, written atomically (temp file plus rename) as the final step
/// of a save. Eviction is left to whatever owns the cache directory.
#[derive(Debug)]
pub struct LocalDiskCache {
    root: PathBuf,
}

impl LocalDiskCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join("entries").join(key)
    }

    fn manifest_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join("manifest.json")
    }
}

#[async_trait]
impl CacheClient for LocalDiskCache {
    async fn restore(&self, paths: &PathSet, key: &str) -> Result<Option<String>> {
        let manifest_path = self.manifest_path(key);
        if !manifest_path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&manifest_path)
            .map_err(|e| Error::cache_backend("restore", format!("read manifest: {e}")))?;
        let manifest: EntryManifest = serde_json::from_str(&raw)
            .map_err(|e| Error::cache_backend("restore", format!("decode manifest: {e}")))?;
        if manifest.key != key {
            return Err(Error::cache_backend(
                "restore",
                format!("manifest key '{}' does not match '{key}'", manifest.key),
            ));
        }

        let entry_dir = self.entry_dir(key);
        for (index, target) in paths.iter().enumerate() {
            let source = entry_dir.join(index.to_string());
            if !source.exists() {
                return Err(Error::cache_backend(
                    "restore",
                    format!("entry '{key}' is missing root {index}"),
                ));
            }
            copy_tree(&source, target)
                .map_err(|e| Error::cache_backend("restore", e.to_string()))?;
        }

        Ok(Some(key.to_string()))
    }

    async fn save(&self, paths: &PathSet, key: &str) -> Result<String> {
        let entry_dir = self.entry_dir(key);
        fs::create_dir_all(&entry_dir)
            .map_err(|e| Error::cache_backend("save", format!("create entry dir: {e}")))?;

        for (index, source) in paths.iter().enumerate() {
            copy_tree(source, &entry_dir.join(index.to_string()))
                .map_err(|e| Error::cache_backend("save", e.to_string()))?;
        }

        let manifest = EntryManifest {
            key: key.to_string(),
            roots: paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        };
        let data = serde_json::to_string_pretty(&manifest).map_err(|e| Error::Json {
            message: "failed to serialize cache entry manifest".to_string(),
            source: e,
        })?;
        write_atomic(&self.manifest_path(key), data.as_bytes())
            .map_err(|e| Error::cache_backend("save", e.to_string()))?;

        Ok(key.to_string())
    }
}

/// Copy a file or directory tree, creating parents as needed. Symlinks are
/// skipped, matching what the fingerprint covers.
fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    let metadata = source
        .symlink_metadata()
        .map_err(|e| Error::file_system(source, "stat", e))?;

    if metadata.is_file() {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::file_system(parent, "create parent directory", e))?;
        }
        fs::copy(source, target).map_err(|e| Error::file_system(source, "copy file", e))?;
        return Ok(());
    }

    if metadata.is_dir() {
        fs::create_dir_all(target)
            .map_err(|e| Error::file_system(target, "create directory", e))?;
        for entry in
            fs::read_dir(source).map_err(|e| Error::file_system(source, "read directory", e))?
        {
            let entry =
                entry.map_err(|e| Error::file_system(source, "read directory entry", e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| Error::file_system(entry.path(), "get file type", e))?;
            if file_type.is_symlink() {
                continue;
            }
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
        return Ok(());
    }

    // Specials are neither hashed nor cached.
    Ok(())
}

/// Write a file atomically by writing to a sibling temp file and renaming.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration("invalid file path: no parent directory"))?;
    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let result = fs::write(&temp_path, content)
        .map_err(|e| Error::file_system(&temp_path, "write temporary file", e));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path, "atomic rename", e)
    })
}

/// Cache backend against a shared HTTP cache service.
///
/// Entries travel as zip archives whose member names are
/// `<root index>/<relative path>`. A 404 on restore is a miss; transport
/// errors are `CacheBackend` errors for the orchestrator to degrade.
pub struct HttpCacheClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCacheClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/cache/{key}", self.base_url)
    }
}

#[async_trait]
impl CacheClient for HttpCacheClient {
    async fn restore(&self, paths: &PathSet, key: &str) -> Result<Option<String>> {
        let url = self.entry_url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::cache_backend("restore", format!("GET {url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::cache_backend(
                "restore",
                format!("GET {url}: status {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::cache_backend("restore", format!("read body: {e}")))?;
        unpack_archive(&body, paths)?;
        Ok(Some(key.to_string()))
    }

    async fn save(&self, paths: &PathSet, key: &str) -> Result<String> {
        let archive = pack_archive(paths)?;
        let url = self.entry_url(key);
        let response = self
            .client
            .put(&url)
            .body(archive)
            .send()
            .await
            .map_err(|e| Error::cache_backend("save", format!("PUT {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::cache_backend(
                "save",
                format!("PUT {url}: status {}", response.status()),
            ));
        }
        Ok(key.to_string())
    }
}

/// Zip up a path set for transport. Member names always use `/`.
fn pack_archive(paths: &PathSet) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (index, root) in paths.iter().enumerate() {
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        for file in files {
            // A file root archives under its own name; a directory root
            // archives its contents relative to itself.
            let member = match file.strip_prefix(root) {
                Ok(relative) if relative.as_os_str().is_empty() => {
                    let name = file
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "file".to_string());
                    format!("{index}/{name}")
                }
                Ok(relative) => format!("{index}/{}", to_archive_path(relative)),
                Err(_) => continue,
            };
            writer
                .start_file(&member, options)
                .map_err(|e| Error::cache_backend("save", format!("zip entry {member}: {e}")))?;
            let content =
                fs::read(&file).map_err(|e| Error::file_system(&file, "read for archive", e))?;
            writer
                .write_all(&content)
                .map_err(|e| Error::cache_backend("save", format!("zip write {member}: {e}")))?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::cache_backend("save", format!("finish archive: {e}")))?;
    Ok(cursor.into_inner())
}

/// Extract an archive produced by [`pack_archive`] back over the path set.
fn unpack_archive(bytes: &[u8], paths: &PathSet) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::cache_backend("restore", format!("open archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::cache_backend("restore", format!("read archive entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let (index, relative) = name.split_once('/').ok_or_else(|| {
            Error::cache_backend("restore", format!("malformed archive member '{name}'"))
        })?;
        let index: usize = index.parse().map_err(|_| {
            Error::cache_backend("restore", format!("malformed archive member '{name}'"))
        })?;
        let root = paths.paths().get(index).ok_or_else(|| {
            Error::cache_backend(
                "restore",
                format!("archive member '{name}' has no matching path root"),
            )
        })?;

        // A file root restores to itself; a directory root gets the member
        // path joined back under it.
        let target = if root.is_dir() {
            root.join(relative)
        } else {
            root.clone()
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::file_system(parent, "create parent directory", e))?;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::cache_backend("restore", format!("read archive entry: {e}")))?;
        fs::write(&target, content)
            .map_err(|e| Error::file_system(&target, "write restored file", e))?;
    }

    Ok(())
}

fn collect_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let metadata = root
        .symlink_metadata()
        .map_err(|e| Error::file_system(root, "stat", e))?;
    if metadata.is_file() {
        files.push(root.to_path_buf());
        return Ok(());
    }
    if metadata.is_dir() {
        for entry in
            fs::read_dir(root).map_err(|e| Error::file_system(root, "read directory", e))?
        {
            let entry = entry.map_err(|e| Error::file_system(root, "read directory entry", e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| Error::file_system(entry.path(), "get file type", e))?;
            if file_type.is_symlink() {
                continue;
            }
            collect_files(&entry.path(), files)?;
        }
    }
    Ok(())
}

fn to_archive_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
