//! Independent reader for the session log.

use crate::validate::report::Finding;
use serde::Deserialize;
use std::path::Path;

pub const LOG_FILE: &str = "events.csv";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub fid: i64,
    pub t: f64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub fid: i64,
    pub t: f64,
    pub etype: String,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub dx: Option<i64>,
    pub dy: Option<i64>,
}

impl EventRow {
    pub fn is_mouse(&self) -> bool {
        self.etype.starts_with("mouse")
    }
}

/// Rows of one log, sorted for checking.
#[derive(Debug, Clone, Default)]
pub struct LoadedLog {
    /// Sorted by frame id
    pub frames: Vec<FrameRow>,
    /// Sorted by (frame id, time), stable
    pub events: Vec<EventRow>,
    /// P01 findings for rows that could not be parsed
    pub malformed: Vec<Finding>,
}

/// Loose view of one CSV row. Typed columns fail the row when unparseable.
#[derive(Debug, Deserialize)]
struct Record {
    row_type: String,
    frame_id: i64,
    time_s: f64,
    #[serde(default)]
    event_type: String,
    frame_path: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    dx: Option<i64>,
    dy: Option<i64>,
}

/// Read and sort every row of the log at `path`.
pub fn load_log(path: &Path) -> Result<LoadedLog, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut log = LoadedLog::default();

    for (index, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                log.malformed.push(malformed(line, &e.to_string()));
                continue;
            }
        };
        let row: Record = match record.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                log.malformed.push(malformed(line, &e.to_string()));
                continue;
            }
        };

        match row.row_type.trim() {
            "frame" => log.frames.push(FrameRow {
                fid: row.frame_id,
                t: row.time_s,
                path: row.frame_path.unwrap_or_default(),
            }),
            "event" => log.events.push(EventRow {
                fid: row.frame_id,
                t: row.time_s,
                etype: row.event_type.trim().to_string(),
                x: row.x,
                y: row.y,
                dx: row.dx,
                dy: row.dy,
            }),
            other => log
                .malformed
                .push(malformed(line, &format!("unknown row type {other:?}"))),
        }
    }

    log.frames.sort_by_key(|f| f.fid);
    log.events
        .sort_by(|a, b| a.fid.cmp(&b.fid).then(a.t.total_cmp(&b.t)));
    Ok(log)
}

fn malformed(line: usize, reason: &str) -> Finding {
    Finding::error("P01", format!("malformed row at line {line}: {reason}"))
}

/// Read the metadata record, if present and parseable.
pub fn load_meta(path: &Path) -> Option<serde_json::Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
