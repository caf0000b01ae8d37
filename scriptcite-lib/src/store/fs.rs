use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::store::ObjectStore;
use crate::{Error, Result};

const OBJECT_EXTENSION: &str = "json";

/// Directory-backed object store.
///
/// Each key maps to `{root}/{key}.json`, so the episode segment of a record
/// key becomes a directory and listing one episode only walks that directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(format!("{key}.{OBJECT_EXTENSION}")))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let relative = relative.to_str()?;
        let key = relative.strip_suffix(&format!(".{OBJECT_EXTENSION}"))?;
        Some(key.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        // only the directory part of the prefix is walked
        let dir = match prefix.rfind('/') {
            Some(i) => &prefix[..i],
            None => "",
        };
        if !dir.is_empty() {
            check_key(dir)?;
        }

        let mut keys = Vec::new();
        let mut pending = vec![self.root.join(dir)];
        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(Error::Store(format!(
                        "failed to list {}: {err}",
                        current.display()
                    )))
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::Store(format!("failed to list {}: {e}", current.display())))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::Store(format!("failed to stat {}: {e}", path.display())))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Store(format!("failed to read {key}: {err}"))),
        }
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Store(format!("failed to create {}: {e}", parent.display())))?;
        }

        // write then rename so readers never see a partial object
        let tmp = path.with_extension(format!("{OBJECT_EXTENSION}.tmp"));
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Store(format!("failed to write {key}: {e}")))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Store(format!("failed to write {key}: {e}")))
    }
}

fn check_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid object key: {key:?}")))
    }
}
