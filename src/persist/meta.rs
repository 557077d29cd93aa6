//! Session metadata and task text, each written exactly once.

use crate::persist::PersistError;
use crate::screen::MonitorInfo;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Attribution convention recorded in every metadata file.
pub const ATTRIBUTION_NOTE: &str =
    "All events between frame i and frame i+1 are attributed to frame i.";

/// Task text written when none was given.
pub const EMPTY_TASK: &str = "(no task specified)";

/// Immutable description of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub rec_id: String,
    pub session_uuid: String,
    /// RFC 3339, local time
    pub created_at: String,
    pub platform: String,
    pub hostname: String,
    pub fps_target: u32,
    pub monitor: MonitorInfo,
    pub stop_key: String,
    pub operator: String,
    pub notes: String,
    pub recorder_version: String,
}

impl SessionMetadata {
    pub fn new(
        rec_id: &str,
        fps_target: u32,
        monitor: MonitorInfo,
        stop_key: &str,
        operator: &str,
    ) -> Self {
        Self {
            rec_id: rec_id.to_string(),
            session_uuid: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Local::now().to_rfc3339(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default(),
            fps_target,
            monitor,
            stop_key: stop_key.to_string(),
            operator: operator.to_string(),
            notes: ATTRIBUTION_NOTE.to_string(),
            recorder_version: crate::VERSION.to_string(),
        }
    }

    /// Write the record. Refuses to replace an existing one.
    pub fn write_once(&self, path: &Path) -> Result<(), PersistError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PersistError::MetadataExists(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }
}

/// Write the free-text task description.
pub fn write_task(path: &Path, task: &str) -> Result<(), PersistError> {
    let text = match task.trim() {
        "" => EMPTY_TASK,
        t => t,
    };
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{text}")?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> MonitorInfo {
        MonitorInfo {
            index: 1,
            name: "test".into(),
            left: 0,
            top: 0,
            width: 8,
            height: 6,
        }
    }

    #[test]
    fn test_metadata_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("meta.json");
        let meta = SessionMetadata::new("rec_1", 20, monitor(), "F10", "alice");

        meta.write_once(&path).unwrap();
        let loaded: SessionMetadata =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.notes, ATTRIBUTION_NOTE);

        match meta.write_once(&path) {
            Err(PersistError::MetadataExists(p)) => assert_eq!(p, path),
            other => panic!("expected MetadataExists, got {other:?}"),
        }
    }

    #[test]
    fn test_task_text() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.txt");
        write_task(&empty, "   ").unwrap();
        assert_eq!(std::fs::read_to_string(&empty).unwrap(), "(no task specified)\n");

        let task = tmp.path().join("task.txt");
        write_task(&task, "  open the browser\n").unwrap();
        assert_eq!(std::fs::read_to_string(&task).unwrap(), "open the browser\n");
    }
}
