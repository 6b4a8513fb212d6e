//! Plain-file backend: one `<key>.json` per blob

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{PersistenceBackend, PersistenceError};

/// Stores each key as a JSON file in a directory
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    /// The directory is created lazily on first write
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the file path for a key
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl PersistenceBackend for FileBackend {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.data_dir)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.key_path(key))?;

        file.write_all(data)?;
        file.sync_all()?;

        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match std::fs::read(self.key_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
