//! Append-only frame/event log.
//!
//! One header row, then `frame` and `event` rows in commit order. Every row is
//! flushed to the OS as soon as it is written; [`LogWriter::sync`] pushes it to
//! stable storage once per tick.

use crate::collector::types::EventPayload;
use crate::core::attribution::{AttributedEvent, FrameRecord};
use crate::persist::PersistError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Column order of the log. This is a stable wire format.
pub const LOG_COLUMNS: [&str; 16] = [
    "row_type",
    "frame_id",
    "time_s",
    "event_type",
    "frame_path",
    "x",
    "y",
    "dx",
    "dy",
    "key",
    "key_code",
    "mouse_button",
    "action",
    "scroll_dx",
    "scroll_dy",
    "modifiers",
];

/// Render session time with microsecond precision.
///
/// Rounding is monotone, so `a <= b` still holds after formatting.
pub fn format_time(t: f64) -> String {
    format!("{t:.6}")
}

/// One log row. Field order must match [`LOG_COLUMNS`].
#[derive(Debug, Default, Serialize)]
struct LogRow<'a> {
    row_type: &'a str,
    frame_id: u64,
    time_s: String,
    event_type: &'a str,
    frame_path: Option<&'a str>,
    x: Option<i32>,
    y: Option<i32>,
    dx: Option<i32>,
    dy: Option<i32>,
    key: Option<&'a str>,
    key_code: Option<u32>,
    mouse_button: Option<&'a str>,
    action: Option<&'a str>,
    scroll_dx: Option<i64>,
    scroll_dy: Option<i64>,
    modifiers: Option<&'a str>,
}

impl<'a> LogRow<'a> {
    fn event(row: &'a AttributedEvent) -> Self {
        let mut out = LogRow {
            row_type: "event",
            frame_id: row.frame_id,
            time_s: format_time(row.event.timestamp),
            event_type: row.event.kind.as_str(),
            ..Default::default()
        };

        if let Some((x, y)) = row.event.position() {
            out.x = Some(x);
            out.y = Some(y);
        }
        if let Some((dx, dy)) = row.delta {
            out.dx = Some(dx);
            out.dy = Some(dy);
        }

        match &row.event.payload {
            EventPayload::Key {
                key,
                key_code,
                modifiers,
            } => {
                out.key = Some(key.as_str());
                out.key_code = *key_code;
                out.modifiers = Some(modifiers.as_str());
            }
            EventPayload::Click { button, action, .. } => {
                out.mouse_button = Some(button.as_str());
                out.action = Some(action.as_str());
            }
            EventPayload::Scroll {
                scroll_dx,
                scroll_dy,
                ..
            } => {
                out.scroll_dx = Some(*scroll_dx);
                out.scroll_dy = Some(*scroll_dy);
            }
            EventPayload::Move { .. } => {}
        }
        out
    }

    fn frame(frame: &FrameRecord, path: &'a str) -> Self {
        LogRow {
            row_type: "frame",
            frame_id: frame.frame_id,
            time_s: format_time(frame.timestamp),
            event_type: "frame",
            frame_path: Some(path),
            ..Default::default()
        }
    }
}

pub struct LogWriter {
    writer: csv::Writer<File>,
}

impl LogWriter {
    /// Create a new log and write its header. Fails if the file exists.
    pub fn create(path: &Path) -> Result<Self, PersistError> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(LOG_COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append_event(&mut self, row: &AttributedEvent) -> Result<(), PersistError> {
        self.writer.serialize(LogRow::event(row))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn append_frame(&mut self, frame: &FrameRecord, path: &str) -> Result<(), PersistError> {
        self.writer.serialize(LogRow::frame(frame, path))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Push everything written so far to stable storage.
    pub fn sync(&mut self) -> Result<(), PersistError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}
