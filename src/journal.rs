use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::AppConfig;
use crate::driver::BatchSummary;
use crate::errors::AppResult;
use crate::resolver::ResolutionSource;

/// Per-record outcomes, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    RunStarted {
        total: usize,
        start_index: usize,
    },
    RecordResolved {
        index: usize,
        facility: String,
        query: String,
        latitude: f64,
        longitude: f64,
        source: ResolutionSource,
    },
    RecordCityLevel {
        index: usize,
        facility: String,
        city: String,
        latitude: f64,
        longitude: f64,
    },
    RecordFailed {
        index: usize,
        facility: String,
    },
    RunCompleted {
        summary: BatchSummary,
    },
}

#[derive(Serialize)]
struct JournalLine<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a JournalEvent,
}

/// Append-only JSONL log with size-based rotation.
pub struct RunJournal {
    path: Option<PathBuf>,
    max_file_bytes: u64,
    max_file_count: usize,
    lock: Mutex<()>,
}

impl RunJournal {
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        if !config.journal_enabled {
            return Ok(Self::disabled());
        }
        Self::at(
            &config.journal_file,
            config.journal_max_bytes,
            config.journal_max_files,
        )
    }

    pub fn at<P: AsRef<Path>>(
        path: P,
        max_file_bytes: u64,
        max_file_count: usize,
    ) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path: Some(path),
            max_file_bytes,
            max_file_count,
            lock: Mutex::new(()),
        })
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            max_file_bytes: 0,
            max_file_count: 0,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, event: &JournalEvent) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(&JournalLine {
            timestamp: Utc::now(),
            event,
        })?;
        line.push(b'\n');

        let _guard = self.lock.lock();
        self.rotate_if_needed(path, line.len() as u64)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    fn rotate_if_needed(&self, path: &Path, incoming_bytes: u64) -> AppResult<()> {
        let current_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if current_size == 0 || current_size + incoming_bytes <= self.max_file_bytes {
            return Ok(());
        }

        if self.max_file_count <= 1 {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            return Ok(());
        }

        let rotated_name = format!(
            "{}-{}.jsonl",
            journal_stem(path),
            Utc::now().format("%Y%m%d%H%M%S%9f")
        );
        let rotated_path = parent_dir(path).join(rotated_name);
        fs::rename(path, &rotated_path)?;

        self.prune_rotations(path)?;
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(())
    }

    fn prune_rotations(&self, path: &Path) -> AppResult<()> {
        let prefix = format!("{}-", journal_stem(path));
        let mut rotations = fs::read_dir(parent_dir(path))?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.file_name().to_string_lossy().to_string();
                (name.starts_with(&prefix) && name.ends_with(".jsonl"))
                    .then(|| (entry.path(), name))
            })
            .collect::<Vec<_>>();

        // Timestamped names sort chronologically.
        rotations.sort_by(|a, b| a.1.cmp(&b.1));
        let allowed = self.max_file_count.saturating_sub(1);
        if rotations.len() > allowed {
            let excess = rotations.len() - allowed;
            for (rotated, _) in rotations.into_iter().take(excess) {
                let _ = fs::remove_file(rotated);
            }
        }
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn journal_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "geocode-events".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn failed(index: usize) -> JournalEvent {
        JournalEvent::RecordFailed {
            index,
            facility: "Rural Health Centre".into(),
        }
    }

    #[test]
    fn writes_tagged_events() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::at(dir.path().join("geocode-events.jsonl"), 1024, 3).unwrap();
        journal
            .record(&JournalEvent::RunStarted {
                total: 2,
                start_index: 0,
            })
            .unwrap();
        journal
            .record(&JournalEvent::RecordResolved {
                index: 0,
                facility: "City Clinic".into(),
                query: "Harare, Zimbabwe".into(),
                latitude: -17.82,
                longitude: 31.05,
                source: ResolutionSource::Cache,
            })
            .unwrap();

        let contents = fs::read_to_string(journal.path().unwrap()).unwrap();
        let lines = contents
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_started");
        assert_eq!(lines[1]["event"], "record_resolved");
        assert_eq!(lines[1]["source"], "cache");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn appends_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode-events.jsonl");
        RunJournal::at(&path, 1024, 3).unwrap().record(&failed(0)).unwrap();
        RunJournal::at(&path, 1024, 3).unwrap().record(&failed(1)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn rotates_and_prunes_old_files() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::at(dir.path().join("geocode-events.jsonl"), 64, 3).unwrap();
        for index in 0..8 {
            journal.record(&failed(index)).unwrap();
        }

        let rotated = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("geocode-events-"))
            .count();
        assert!(rotated >= 1);
        assert!(rotated <= 2);
    }

    #[test]
    fn disabled_journal_writes_nothing() {
        let journal = RunJournal::disabled();
        journal.record(&failed(0)).unwrap();
        assert!(journal.path().is_none());
    }
}
