use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::{self, ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use walkdir::WalkDir;

use super::{
    ObjectClient, ObjectReader, ObjectSource, ObjectStoreError, StorageCommonPrefix, StorageObject,
};

/// Local filesystem object store for development and testing.
/// Keys map to paths relative to `base_path`; `/` in a key creates
/// subdirectories.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Resolve `key` under `base_path`. Keys that are empty, absolute or
    /// carry `.`/`..` components are rejected.
    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(key);
        let inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !inside {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                format!("object key {key:?} resolves outside the store"),
            )));
        }
        Ok(self.base_path.join(relative))
    }

    /// Every stored key with its modification time, in no particular order.
    async fn walk(&self) -> Result<Vec<StorageObject>, ObjectStoreError> {
        let base = self.base_path.clone();
        let objects = tokio::task::spawn_blocking(move || walk_tree(&base))
            .await
            .map_err(io::Error::other)??;
        Ok(objects)
    }
}

fn walk_tree(base: &Path) -> Result<Vec<StorageObject>, io::Error> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(base).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = entry.metadata().map_err(io::Error::from)?.modified()?;
        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        objects.push(StorageObject {
            key: key_for(relative),
            modified_at: DateTime::<Utc>::from(modified),
        });
    }
    Ok(objects)
}

fn key_for(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectClient for LocalStore {
    async fn get_object(&self, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        mut object: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        object.seek(SeekFrom::Start(0)).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        tokio::io::copy(&mut object, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
    ) -> Result<(Vec<StorageObject>, Vec<StorageCommonPrefix>), ObjectStoreError> {
        let mut all = self.walk().await?;
        all.retain(|o| o.key.starts_with(prefix));
        all.sort_by(|a, b| a.key.cmp(&b.key));

        if delimiter.is_empty() {
            return Ok((all, Vec::new()));
        }

        let mut objects = Vec::new();
        let mut prefixes = BTreeSet::new();
        for object in all {
            let rest = &object.key[prefix.len()..];
            match rest.find(delimiter) {
                Some(idx) => {
                    let end = prefix.len() + idx + delimiter.len();
                    prefixes.insert(StorageCommonPrefix(object.key[..end].to_string()));
                }
                None => objects.push(object),
            }
        }

        Ok((objects, prefixes.into_iter().collect()))
    }

    fn stop(&self) {}
}
