// A JSON document on disk with an in-memory copy.
//
// Reads are served from memory. Every update holds the write lock while the
// new document is written to a temp file and renamed over the old one, so
// the file on disk is always a complete document. Memory only changes once
// the write succeeded.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct JsonFile<T> {
    path: PathBuf,
    data: RwLock<T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Load `path`, or start empty if it doesn't exist yet. A file that
    /// can't be parsed is moved aside to `<name>.bak` and replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = if path.exists() {
            let file = std::fs::File::open(&path)?;
            match serde_json::from_reader(std::io::BufReader::new(file)) {
                Ok(data) => data,
                Err(e) => {
                    let backup = backup_path(&path);
                    tracing::warn!(
                        path = %path.display(),
                        backup = %backup.display(),
                        error = %e,
                        "Unreadable data file, starting fresh"
                    );
                    std::fs::rename(&path, &backup)?;
                    T::default()
                }
            }
        } else {
            T::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let data = self.data.read().await;
        f(&data)
    }

    /// Apply `f` and persist the result. If the write fails the in-memory
    /// copy is left as it was.
    pub async fn update<R, F>(&self, f: F) -> Result<R, JsonFileError>
    where
        F: FnOnce(&mut T) -> R + Send,
    {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let result = f(&mut next);
        self.persist(&next)?;
        *data = next;
        Ok(result)
    }

    fn persist(&self, data: &T) -> Result<(), JsonFileError> {
        let tmp = self.path.with_extension("json.tmp");
        let file = std::fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn updates_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("counts.json");

        let file: JsonFile<HashMap<u64, u32>> = JsonFile::open(&path).unwrap();
        file.update(|m| m.insert(7, 3)).await.unwrap();
        assert_eq!(file.read(|m| m.get(&7).copied()).await, Some(3));

        let reopened: JsonFile<HashMap<u64, u32>> = JsonFile::open(&path).unwrap();
        assert_eq!(reopened.read(|m| m.get(&7).copied()).await, Some(3));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counts.json");

        let file: JsonFile<HashMap<u64, u32>> = JsonFile::open(&path).unwrap();
        file.update(|m| m.insert(1, 1)).await.unwrap();

        // A directory in the temp file's place makes the write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(file.update(|m| m.insert(2, 2)).await.is_err());
        assert_eq!(file.read(|m| m.get(&2).copied()).await, None);
        assert_eq!(file.read(|m| m.len()).await, 1);

        std::fs::remove_dir(path.with_extension("json.tmp")).unwrap();
        file.update(|m| m.insert(3, 3)).await.unwrap();
        let reopened: JsonFile<HashMap<u64, u32>> = JsonFile::open(&path).unwrap();
        assert_eq!(reopened.read(|m| m.len()).await, 2);
        assert_eq!(reopened.read(|m| m.get(&2).copied()).await, None);
    }

    #[tokio::test]
    async fn corrupt_file_is_backed_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file: JsonFile<HashMap<u64, u32>> = JsonFile::open(&path).unwrap();
        assert!(file.read(|m| m.is_empty()).await);
        assert!(dir.path().join("broken.json.bak").exists());
    }
}
