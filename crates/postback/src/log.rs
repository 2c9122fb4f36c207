//! Append-only JSONL audit log of raw postback payloads
//!
//! Every payload is written here before validation, so disputes with a
//! network can be settled from what was actually received, including the
//! requests we rejected.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PostbackError;

/// One audit line: the raw payload plus when we saw it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPostback {
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Append-only JSONL file, one `RawPostback` per line. Never rewritten.
pub struct PostbackLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl PostbackLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PostbackError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// A log that validates serialization but stores nothing (for tests)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            file: Mutex::new(None),
        }
    }

    pub fn append(&self, payload: &serde_json::Value, now: DateTime<Utc>) -> Result<(), PostbackError> {
        let record = RawPostback {
            received_at: now,
            payload: payload.clone(),
        };
        let json = serde_json::to_string(&record)?;

        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", json)?;
            file.flush()?;
        }
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<RawPostback>, PostbackError> {
        {
            let guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
            if guard.is_none() {
                return Ok(Vec::new());
            }
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("postbacks.jsonl");
        let now = Utc::now();

        let log = PostbackLog::new(&path).unwrap();
        log.append(&json!({"transaction_id": "TX-1"}), now).unwrap();
        log.append(&json!({"transaction_id": "TX-2", "garbage": true}), now)
            .unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload["transaction_id"], "TX-1");
        assert_eq!(records[1].payload["garbage"], true);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("postbacks.jsonl");
        let now = Utc::now();

        {
            let log = PostbackLog::new(&path).unwrap();
            log.append(&json!({"n": 1}), now).unwrap();
        }
        let log = PostbackLog::new(&path).unwrap();
        log.append(&json!({"n": 2}), now).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_in_memory_stores_nothing() {
        let log = PostbackLog::in_memory();
        log.append(&json!({"n": 1}), Utc::now()).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }
}
