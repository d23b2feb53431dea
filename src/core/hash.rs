use log::debug;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Hex characters of the BLAKE3 digest kept in ids and filenames.
pub const DIGEST_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Short content digest: identical bytes always give the same id.
pub fn content_digest(bytes: &[u8]) -> String {
    let hex = blake3::hash(bytes).to_hex();
    hex.as_str()[..DIGEST_LEN].to_string()
}

/// Content-addressed image storage in the output directory.
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Write `bytes` under `filename` unless the file is already there.
    /// Returns whether anything was written.
    pub fn persist(&self, filename: &str, bytes: &[u8]) -> Result<bool, StoreError> {
        let path = self.path(filename);
        if path.exists() {
            debug!("{} already stored", filename);
            return Ok(false);
        }
        fs::write(&path, bytes).map_err(|source| StoreError::Write { path, source })?;
        Ok(true)
    }
}
