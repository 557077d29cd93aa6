//! Lock-free counters describing a running session.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters updated by the listener threads and the frame loop.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Key events normalized by the keyboard listener
    key_events: AtomicU64,
    /// Mouse events normalized by the mouse listener
    mouse_events: AtomicU64,
    /// Frame rows committed
    frames_captured: AtomicU64,
    /// Event rows committed
    events_written: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_key_event(&self) {
        self.key_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mouse_event(&self) {
        self.mouse_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_written(&self, count: u64) {
        self.events_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            key_events: self.key_events.load(Ordering::Relaxed),
            mouse_events: self.mouse_events.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
        }
    }

    /// Multi-line summary for display at session close.
    pub fn summary(&self, elapsed_secs: f64) -> String {
        let stats = self.snapshot();
        let fps = stats.frames_captured as f64 / elapsed_secs.max(1e-6);
        format!(
            "Session Statistics:\n\
             - Frames captured: {}\n\
             - Events written: {}\n\
             - Key events observed: {}\n\
             - Mouse events observed: {}\n\
             - Duration: {:.2} seconds (~{:.1} fps)",
            stats.frames_captured,
            stats.events_written,
            stats.key_events,
            stats.mouse_events,
            elapsed_secs,
            fps
        )
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub key_events: u64,
    pub mouse_events: u64,
    pub frames_captured: u64,
    pub events_written: u64,
}

pub type SharedSessionStats = Arc<SessionStats>;
