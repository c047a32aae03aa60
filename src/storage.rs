//! Local key/value stores for persisted map snapshots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::Result;

const SNAPSHOT_EXTENSION: &str = "json";
const TEMP_MARKER: &str = ".tmp.";

/// String key/value storage that survives the resolver.
pub trait SnapshotStore: Send + Sync {
    /// Stored value for `key`, `None` when absent.
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>>>;

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<()>>;

    /// Remove keys under `scope` that are not under `keep`. Returns how many
    /// entries were dropped.
    fn prune(&self, scope: &str, keep: &str) -> BoxFuture<'static, Result<usize>>;
}

/// In-memory store. Clones share contents, which lets tests model a second
/// process reusing the same storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Synchronous read, for inspection.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// Synchronous write, for seeding.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>>> {
        let value = self.peek(key);
        async move { Ok(value) }.boxed()
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<()>> {
        self.values.insert(key.to_string(), value);
        async { Ok(()) }.boxed()
    }

    fn prune(&self, scope: &str, keep: &str) -> BoxFuture<'static, Result<usize>> {
        let before = self.values.len();
        self.values
            .retain(|key, _| !key.starts_with(scope) || key.starts_with(keep));
        let removed = before - self.values.len();
        async move { Ok(removed) }.boxed()
    }
}

/// One JSON file per key under a directory, written atomically.
#[derive(Clone, Debug)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Open (and create) the store directory, removing temp files left
    /// behind by interrupted writes.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        if let Ok(entries) = std::fs::read_dir(directory) {
            for entry in entries.flatten() {
                let path = entry.path();
                let orphaned = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(TEMP_MARKER));
                if orphaned {
                    log::warn!("Removing orphaned temp file: {:?}", path);
                    let _ = std::fs::remove_file(path);
                }
            }
        }

        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File backing `key`. Characters outside `[A-Za-z0-9_-]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{SNAPSHOT_EXTENSION}", file_stem(key)))
    }

    async fn prune_files(directory: PathBuf, scope: String, keep: String) -> Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(&scope) && !name.starts_with(&keep) {
                log::debug!("Removing stale snapshot {:?}", entry.path());
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn read(path: PathBuf) -> Result<Option<String>> {
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(path: PathBuf, value: String) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot")
            .to_string();
        let temp_path = path.with_file_name(format!("{file_name}{TEMP_MARKER}{}", Uuid::new_v4()));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;
        log::debug!("Wrote snapshot {:?} ({} bytes)", path, value.len());
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>>> {
        Self::read(self.path_for(key)).boxed()
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<()>> {
        Self::write(self.path_for(key), value).boxed()
    }

    fn prune(&self, scope: &str, keep: &str) -> BoxFuture<'static, Result<usize>> {
        Self::prune_files(self.directory.clone(), file_stem(scope), file_stem(keep)).boxed()
    }
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
