//! Offline session validator.
//!
//! Reads a finished session directory and re-checks the recording invariants
//! from the persisted log and images alone. It keeps its own row model and
//! file names and never calls into the writer, so a writer bug cannot hide
//! itself by being checked with the same code.
//!
//! Violations are collected, never raised: [`validate_session`] only fails
//! when the log cannot be read at all.

pub mod checks;
pub mod load;
pub mod report;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use load::{load_log, load_meta, EventRow, FrameRow, LoadedLog, LOG_FILE, META_FILE};
pub use report::{Finding, Severity, Summary, ValidationReport};

/// Comparison tolerance for timestamps, in seconds.
pub const TIME_EPSILON: f64 = 1e-9;

/// Errors that stop validation before any check runs.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("session log not found: {}", .0.display())]
    MissingLog(PathBuf),
    #[error("cannot read session log: {0}")]
    Csv(#[from] csv::Error),
}

/// Treatment of events recorded before frame 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyEventPolicy {
    /// Report as warning W10
    #[default]
    Warn,
    /// Report as error E04
    Error,
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub check_images: bool,
    /// Frames shape-checked at each end (0 = none, negative = all)
    pub sample_frames: i64,
    pub early_events: EarlyEventPolicy,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            check_images: true,
            sample_frames: 8,
            early_events: EarlyEventPolicy::Warn,
        }
    }
}

/// Validate one session directory.
pub fn validate_session(
    rec_dir: &Path,
    options: &ValidateOptions,
) -> Result<ValidationReport, ValidateError> {
    let log_path = rec_dir.join(LOG_FILE);
    if !log_path.is_file() {
        return Err(ValidateError::MissingLog(log_path));
    }

    let meta = load_meta(&rec_dir.join(META_FILE));
    let log = load_log(&log_path)?;
    debug!(
        frames = log.frames.len(),
        events = log.events.len(),
        malformed = log.malformed.len(),
        "session log loaded"
    );

    let mut findings = log.malformed.clone();
    findings.extend(checks::check_frames(&log.frames));
    findings.extend(checks::check_events(
        &log.frames,
        &log.events,
        options.early_events,
    ));
    let (mouse_findings, mouse_checked) = checks::check_mouse_deltas(&log.events);
    findings.extend(mouse_findings);

    let mut reference_size = None;
    if options.check_images {
        let (image_findings, size) =
            checks::check_images(rec_dir, &log.frames, options.sample_frames);
        findings.extend(image_findings);
        reference_size = size;
    }

    let fps_target = meta
        .as_ref()
        .and_then(|m| m.get("fps_target"))
        .and_then(|v| v.as_f64());
    let summary = Summary::compute(&log, fps_target, mouse_checked, reference_size);

    Ok(ValidationReport::new(rec_dir, findings, summary))
}
