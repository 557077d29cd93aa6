//! Findings, summary statistics and report rendering.

use crate::validate::load::LoadedLog;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

const MAX_ERRORS_SHOWN: usize = 200;
const MAX_WARNINGS_SHOWN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One invariant violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
}

impl Finding {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            frame_id: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn for_frame(mut self, frame_id: i64) -> Self {
        self.frame_id = Some(frame_id);
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Aggregate statistics of a session log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub frames: usize,
    pub events: usize,
    /// Mean inter-frame interval in seconds
    pub interval_mean: Option<f64>,
    pub interval_std_dev: Option<f64>,
    pub fps_estimate: Option<f64>,
    pub fps_target: Option<f64>,
    pub events_per_frame_min: usize,
    pub events_per_frame_max: usize,
    pub events_per_frame_avg: f64,
    /// Count per event type, most frequent first
    pub event_types: Vec<(String, usize)>,
    pub mouse_events_checked: usize,
    pub reference_size: Option<(u32, u32)>,
}

impl Summary {
    pub fn compute(
        log: &LoadedLog,
        fps_target: Option<f64>,
        mouse_events_checked: usize,
        reference_size: Option<(u32, u32)>,
    ) -> Self {
        let gaps: Vec<f64> = log.frames.windows(2).map(|w| w[1].t - w[0].t).collect();
        let interval_mean = (!gaps.is_empty()).then(|| gaps.iter().mean());
        let interval_std_dev = (gaps.len() > 1).then(|| gaps.iter().std_dev());
        let fps_estimate = interval_mean.filter(|m| *m > 0.0).map(|m| 1.0 / m);

        let mut per_frame: HashMap<i64, usize> =
            log.frames.iter().map(|f| (f.fid, 0)).collect();
        let mut types: HashMap<&str, usize> = HashMap::new();
        for event in &log.events {
            if let Some(count) = per_frame.get_mut(&event.fid) {
                *count += 1;
            }
            *types.entry(event.etype.as_str()).or_default() += 1;
        }

        let mut event_types: Vec<(String, usize)> = types
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        event_types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let frames = log.frames.len();
        let events_per_frame_avg = if frames == 0 {
            0.0
        } else {
            per_frame.values().sum::<usize>() as f64 / frames as f64
        };

        Self {
            frames,
            events: log.events.len(),
            interval_mean,
            interval_std_dev,
            fps_estimate,
            fps_target,
            events_per_frame_min: per_frame.values().copied().min().unwrap_or(0),
            events_per_frame_max: per_frame.values().copied().max().unwrap_or(0),
            events_per_frame_avg,
            event_types,
            mouse_events_checked,
            reference_size,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames == 0 {
            return writeln!(f, "No frames; summary unavailable");
        }
        writeln!(f, "Frames: {}", self.frames)?;
        writeln!(f, "Events: {}", self.events)?;

        if let Some(mean) = self.interval_mean {
            write!(f, "Mean frame interval: {mean:.4} s")?;
            if let Some(sd) = self.interval_std_dev {
                write!(f, " (sd {sd:.4} s)")?;
            }
            if let Some(fps) = self.fps_estimate {
                write!(f, ", ~{fps:.2} fps")?;
            }
            if let Some(target) = self.fps_target {
                write!(f, " / target {target}")?;
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "Events per frame: min={}, max={}, avg={:.2}",
            self.events_per_frame_min, self.events_per_frame_max, self.events_per_frame_avg
        )?;

        let types = if self.event_types.is_empty() {
            "-".to_string()
        } else {
            self.event_types
                .iter()
                .map(|(name, count)| format!("{name}:{count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "Event types: {types}")?;

        if self.mouse_events_checked > 0 {
            writeln!(f, "Mouse deltas checked: {}", self.mouse_events_checked)?;
        }
        if let Some((w, h)) = self.reference_size {
            writeln!(f, "Reference frame size: {w}x{h}")?;
        }
        Ok(())
    }
}

/// Everything the validator found in one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub rec_dir: PathBuf,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub summary: Summary,
}

impl ValidationReport {
    pub fn new(rec_dir: &Path, findings: Vec<Finding>, summary: Summary) -> Self {
        let (errors, warnings) = findings
            .into_iter()
            .partition(|f| f.severity == Severity::Error);
        Self {
            rec_dir: rec_dir.to_path_buf(),
            errors,
            warnings,
            summary,
        }
    }

    /// True when no errors were found. Warnings do not count.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        if self.is_ok() {
            0
        } else {
            2
        }
    }

    /// Findings with the given code, errors first.
    pub fn with_code(&self, code: &str) -> Vec<&Finding> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .filter(|f| f.code == code)
            .collect()
    }
}

fn write_capped(
    f: &mut fmt::Formatter<'_>,
    findings: &[Finding],
    cap: usize,
    noun: &str,
) -> fmt::Result {
    for finding in findings.iter().take(cap) {
        writeln!(f, "{finding}")?;
    }
    if findings.len() > cap {
        writeln!(f, "... and {} more {noun}", findings.len() - cap)?;
    }
    Ok(())
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== SUMMARY: {} ====", self.rec_dir.display())?;
        write!(f, "{}", self.summary)?;

        if !self.warnings.is_empty() {
            writeln!(f, "\n---- WARNINGS ({}) ----", self.warnings.len())?;
            write_capped(f, &self.warnings, MAX_WARNINGS_SHOWN, "warnings")?;
        }

        if self.errors.is_empty() {
            writeln!(f, "\nOK: no violations found")
        } else {
            writeln!(f, "\n**** ERRORS FOUND ({}) ****", self.errors.len())?;
            write_capped(f, &self.errors, MAX_ERRORS_SHOWN, "errors")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::load::{EventRow, FrameRow};

    fn frame(fid: i64, t: f64) -> FrameRow {
        FrameRow {
            fid,
            t,
            path: format!("frames/{fid:06}.png"),
        }
    }

    fn event(fid: i64, t: f64, etype: &str) -> EventRow {
        EventRow {
            fid,
            t,
            etype: etype.to_string(),
            x: None,
            y: None,
            dx: None,
            dy: None,
        }
    }

    #[test]
    fn test_summary_statistics() {
        let log = LoadedLog {
            frames: vec![frame(1, 0.0), frame(2, 0.05), frame(3, 0.10), frame(4, 0.15)],
            events: vec![
                event(1, 0.01, "mouse_move"),
                event(1, 0.02, "mouse_move"),
                event(2, 0.06, "key_down"),
                event(4, 0.16, "key_up"),
                event(4, 0.17, "mouse_move"),
            ],
            malformed: Vec::new(),
        };
        let summary = Summary::compute(&log, Some(20.0), 3, Some((640, 360)));

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.events, 5);
        assert!((summary.interval_mean.unwrap() - 0.05).abs() < 1e-12);
        assert!(summary.interval_std_dev.unwrap() < 1e-9);
        assert!((summary.fps_estimate.unwrap() - 20.0).abs() < 1e-6);
        assert_eq!(summary.events_per_frame_min, 0);
        assert_eq!(summary.events_per_frame_max, 2);
        assert!((summary.events_per_frame_avg - 1.25).abs() < 1e-12);
        assert_eq!(
            summary.event_types,
            vec![
                ("mouse_move".to_string(), 3),
                ("key_down".to_string(), 1),
                ("key_up".to_string(), 1),
            ]
        );

        let text = summary.to_string();
        assert!(text.contains("Events per frame: min=0, max=2, avg=1.25"));
        assert!(text.contains("Event types: mouse_move:3, key_down:1, key_up:1"));
        assert!(text.contains("Reference frame size: 640x360"));
    }

    #[test]
    fn test_report_caps_listing() {
        let findings: Vec<Finding> = (0..205)
            .map(|i| Finding::error("F02", format!("gap {i}")))
            .chain(std::iter::once(Finding::warning("W10", "early")))
            .collect();
        let summary = Summary::compute(&LoadedLog::default(), None, 0, None);
        let report = ValidationReport::new(Path::new("rec"), findings, summary);

        assert!(!report.is_ok());
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.errors.len(), 205);
        assert_eq!(report.warnings.len(), 1);

        let text = report.to_string();
        assert!(text.contains("[F02] gap 199"));
        assert!(!text.contains("[F02] gap 200"));
        assert!(text.contains("... and 5 more errors"));
        assert!(text.contains("[W10] early"));
    }
}
