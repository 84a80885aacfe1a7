use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::*;
use tokio::fs;

use super::{KvStore, StorageError};

const EMPTY_LIST: &str = "[]";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each key as `<data_dir>/<key>.json`.
///
/// A file that does not exist yet is created holding an empty JSON array the
/// first time it is read, so a fresh data directory reads as an empty wall.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new contents.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(StorageError::Backend(format!("invalid key {:?}", key)));
        }
        let mut path = self.data_dir.clone();
        path.push(format!("{}.json", key));
        Ok(path)
    }

    /// Leading `.` keeps temporaries out of the key namespace.
    fn tmp_path_for(&self, key: &str) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.data_dir
            .join(format!(".{}.json.{}.{}.tmp", key, process::id(), n))
    }

    async fn replace(&self, key: &str, path: &Path, contents: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir).await?;
        let tmp = self.tmp_path_for(key);
        if let Err(e) = fs::write(&tmp, contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Initializing {}", path.display());
                self.replace(key, &path, EMPTY_LIST).await?;
                Ok(Some(EMPTY_LIST.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        self.replace(key, &path, &value).await
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
