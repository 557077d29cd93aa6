//! Frame/event attribution.
//!
//! Events drained at boundary `k+1` belong to frame `k`: frame `k` covers
//! everything observed between its own capture and the next one. Mouse deltas
//! are taken against a running cursor that spans the whole session.

use crate::collector::types::InputEvent;

/// An event bound to the frame that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedEvent {
    pub frame_id: u64,
    pub event: InputEvent,
    /// Pointer delta from the previous recorded mouse event, mouse events only
    pub delta: Option<(i32, i32)>,
}

/// A committed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame_id: u64,
    /// Session-relative seconds at the capture boundary
    pub timestamp: f64,
}

/// Attribution state owned by the frame loop thread.
#[derive(Debug, Default)]
pub struct Attributor {
    frame_id: u64,
    cursor: Option<(i32, i32)>,
}

impl Attributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the last committed frame, 0 before the first frame.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Bind drained events to the last committed frame and compute mouse deltas.
    ///
    /// The first mouse event of the session gets `(0, 0)`.
    pub fn attribute(&mut self, events: Vec<InputEvent>) -> Vec<AttributedEvent> {
        events
            .into_iter()
            .map(|event| {
                let delta = event.position().map(|(x, y)| {
                    let delta = match self.cursor {
                        Some((px, py)) => (x - px, y - py),
                        None => (0, 0),
                    };
                    self.cursor = Some((x, y));
                    delta
                });
                AttributedEvent {
                    frame_id: self.frame_id,
                    event,
                    delta,
                }
            })
            .collect()
    }

    /// Id the next committed frame will get.
    pub fn next_frame_id(&self) -> u64 {
        self.frame_id + 1
    }

    /// Advance to the next frame id.
    pub fn commit_frame(&mut self, timestamp: f64) -> FrameRecord {
        self.frame_id += 1;
        FrameRecord {
            frame_id: self.frame_id,
            timestamp,
        }
    }
}
