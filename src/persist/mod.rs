//! On-disk session contract.
//!
//! A session directory holds one immutable metadata record, the task text, an
//! append-only frame/event log and one PNG per frame.

pub mod frames;
pub mod log;
pub mod meta;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use frames::FrameStore;
pub use log::{format_time, LogWriter, LOG_COLUMNS};
pub use meta::{write_task, SessionMetadata, ATTRIBUTION_NOTE, EMPTY_TASK};

/// Errors raised while persisting a session. All of them end the session.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("session metadata already exists at {}", .0.display())]
    MetadataExists(PathBuf),
}

/// Paths inside one session directory.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    dir: PathBuf,
}

impl SessionLayout {
    pub fn new(dataset_root: impl AsRef<Path>, rec_id: &str) -> Self {
        Self {
            dir: dataset_root.as_ref().join(rec_id),
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("events.csv")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    pub fn task_path(&self) -> PathBuf {
        self.dir.join("task.txt")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.dir.join("frames")
    }

    /// External emergency-stop flag.
    pub fn stop_flag_path(&self) -> PathBuf {
        self.dir.join(".stop")
    }

    /// Log reference for a frame image, relative to the session directory.
    pub fn frame_rel_path(frame_id: u64) -> String {
        format!("frames/{frame_id:06}.png")
    }

    /// Create the session and frames directories.
    pub fn create_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.frames_dir())
    }

    /// Delete the stop flag if present. Returns whether a file was removed.
    pub fn remove_stop_flag(&self) -> io::Result<bool> {
        match std::fs::remove_file(self.stop_flag_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = SessionLayout::new("/data", "rec_1");
        assert_eq!(layout.dir(), Path::new("/data/rec_1"));
        assert_eq!(layout.log_path(), Path::new("/data/rec_1/events.csv"));
        assert_eq!(layout.stop_flag_path(), Path::new("/data/rec_1/.stop"));
        assert_eq!(SessionLayout::frame_rel_path(7), "frames/000007.png");
        assert_eq!(SessionLayout::frame_rel_path(1234567), "frames/1234567.png");
    }

    #[test]
    fn test_remove_stop_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = SessionLayout::from_dir(tmp.path());
        assert!(!layout.remove_stop_flag().unwrap());

        std::fs::write(layout.stop_flag_path(), b"").unwrap();
        assert!(layout.remove_stop_flag().unwrap());
        assert!(!layout.stop_flag_path().exists());
    }
}
