//! File-backed key/value store
//!
//! One file per key inside a single directory; keys are url-encoded into
//! filenames so namespace separators and arbitrary characters round-trip.
//! Writes go to a sibling `.tmp` file, fsync, then rename, so a crash
//! mid-write leaves the previous value intact rather than a torn file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use trailhead_core::KeyValueStore;
use trailhead_domain::{Result, TrailheadError};

use crate::errors::InfraError;

const TMP_SUFFIX: &str = ".tmp";

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|err| TrailheadError::from(InfraError::from(err)))?;
        debug!(dir = %dir.display(), "File store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(urlencoding::encode(key).into_owned())
    }

    fn key_from(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(TMP_SUFFIX) {
            return None;
        }
        urlencoding::decode(name).ok().map(|k| k.into_owned())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp_path = {
            let mut name = path.as_os_str().to_owned();
            name.push(TMP_SUFFIX);
            PathBuf::from(name)
        };

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &path).await
        };

        if let Err(err) = write.await {
            // Best effort; a stale tmp file is skipped by enumeration.
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %cleanup, "Could not remove stale temp file");
                }
            }
            return Err(InfraError::from(err).into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|err| TrailheadError::from(InfraError::from(err)))?;

        let mut keys = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|err| TrailheadError::from(InfraError::from(err)))?
        {
            if let Some(key) = Self::key_from(&entry.path()) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}
