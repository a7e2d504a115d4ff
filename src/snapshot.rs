use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-collection JSON snapshot on local disk.
///
/// Every write replaces the file through a temp file + rename, so a failed
/// write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no snapshot has been written yet.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, SnapshotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SnapshotError::Serde {
                path: self.path.clone(),
                source,
            })
    }

    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Serde {
            path: self.path.clone(),
            source,
        })?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path(), "vehicles");
        let loaded: Option<Vec<String>> = snap.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn write_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path(), "alerts");
        snap.write(&vec!["a", "b"]).unwrap();
        snap.write(&vec!["c"]).unwrap();

        let loaded: Vec<String> = snap.load().unwrap().unwrap();
        assert_eq!(loaded, vec!["c".to_string()]);
        assert!(!snap.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path(), "devices");
        fs::write(snap.path(), b"{ nope").unwrap();
        let result: Result<Option<Vec<String>>, _> = snap.load();
        assert!(matches!(result, Err(SnapshotError::Serde { .. })));
    }
}
