use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::persist::write_atomic;

/// Durable marker of the last fully processed record.
///
/// `load` returns `None` when no record has been completed yet, so
/// processing starts at index 0. `save` must only be called after the
/// record's output row is durably written.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> AppResult<Option<usize>>;
    fn save(&self, index: usize) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

/// Index at which a run should begin given the stored checkpoint.
pub fn resume_offset(checkpoint: Option<usize>) -> usize {
    checkpoint.map_or(0, |index| index + 1)
}

#[derive(Default)]
pub struct MemoryCheckpoint {
    last_index: Mutex<Option<usize>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> AppResult<Option<usize>> {
        Ok(*self.last_index.lock())
    }

    fn save(&self, index: usize) -> AppResult<()> {
        *self.last_index.lock() = Some(index);
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.last_index.lock() = None;
        Ok(())
    }
}

// -1 on disk means "nothing completed yet".
#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    last_index: i64,
}

pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> AppResult<Option<usize>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AppError::Io(err)),
        };
        let parsed: CheckpointFile = serde_json::from_str(&contents)?;
        if parsed.last_index < 0 {
            return Ok(None);
        }
        usize::try_from(parsed.last_index)
            .map(Some)
            .map_err(|_| {
                AppError::Config(format!(
                    "checkpoint index out of range: {}",
                    parsed.last_index
                ))
            })
    }

    fn save(&self, index: usize) -> AppResult<()> {
        let last_index = i64::try_from(index)
            .map_err(|_| AppError::Config(format!("checkpoint index out of range: {index}")))?;
        let payload = serde_json::to_vec(&CheckpointFile { last_index })?;
        write_atomic(&self.path, &payload)?;
        debug!(index, path = %self.path.display(), "checkpoint saved");
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "checkpoint already absent");
                Ok(())
            }
            Err(err) => Err(AppError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_checkpoint_starts_from_first_record() {
        let dir = tempdir().unwrap();
        let store = FileCheckpoint::new(dir.path().join("geocode_checkpoint.json"));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(resume_offset(store.load().unwrap()), 0);
    }

    #[test]
    fn save_load_clear_cycle() {
        let dir = tempdir().unwrap();
        let store = FileCheckpoint::new(dir.path().join("geocode_checkpoint.json"));

        store.save(4).unwrap();
        assert_eq!(store.load().unwrap(), Some(4));
        assert_eq!(resume_offset(Some(4)), 5);
        assert!(store.exists());

        store.clear().unwrap();
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn negative_sentinel_means_no_progress() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode_checkpoint.json");
        fs::write(&path, r#"{"last_index": -1}"#).unwrap();
        assert_eq!(FileCheckpoint::new(&path).load().unwrap(), None);
    }

    #[test]
    fn memory_store_tracks_last_index() {
        let store = MemoryCheckpoint::new();
        store.save(0).unwrap();
        store.save(1).unwrap();
        assert_eq!(store.load().unwrap(), Some(1));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
