//! Lock-guarded queue of pending input events.
//!
//! Listener threads append; the frame loop drains. All three operations share
//! one critical section, so no drain can observe a half-applied append.
//!
//! Events are stamped on the hook thread and appended later by a listener.
//! The buffer counts callbacks announced at stamping time against events that
//! have landed, separately for each input source. Each source feeds one FIFO
//! channel and one listener, so once a source's landed count reaches a
//! [`Watermark`] taken at a boundary, every callback that source announced
//! before the boundary is in the queue.

use crate::collector::types::InputEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Device a callback came from. Each one has its own channel and listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Mouse,
}

impl InputSource {
    const ALL: [InputSource; 2] = [InputSource::Keyboard, InputSource::Mouse];

    fn index(self) -> usize {
        match self {
            InputSource::Keyboard => 0,
            InputSource::Mouse => 1,
        }
    }
}

/// Per-source announced counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark([u64; 2]);

#[derive(Debug, Default)]
pub struct EventBuffer {
    queue: Mutex<VecDeque<InputEvent>>,
    announced: [AtomicU64; 2],
    landed: [AtomicU64; 2],
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a callback is about to be stamped and handed to a listener.
    pub fn announce(&self, source: InputSource) {
        self.announced[source.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// Queue an event. Never blocks beyond the short critical section.
    pub fn append(&self, event: InputEvent) {
        self.queue.lock().push_back(event);
    }

    /// Queue an event that `source` announced earlier.
    pub fn land(&self, source: InputSource, event: InputEvent) {
        self.append(event);
        self.landed[source.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// Account for announced callbacks that will never be appended.
    pub fn abandon(&self, source: InputSource, count: u64) {
        self.landed[source.index()].fetch_add(count, Ordering::SeqCst);
    }

    /// Snapshot of everything announced so far.
    pub fn watermark(&self) -> Watermark {
        Watermark(InputSource::ALL.map(|s| self.announced[s.index()].load(Ordering::SeqCst)))
    }

    fn reached(&self, mark: &Watermark) -> bool {
        InputSource::ALL
            .iter()
            .all(|s| self.landed[s.index()].load(Ordering::SeqCst) >= mark.0[s.index()])
    }

    /// Wait until every callback announced before `mark` was taken has landed.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_for(&self, mark: &Watermark, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.reached(mark) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
        true
    }

    /// Wait until every callback announced so far has landed.
    pub fn settle(&self, timeout: Duration) -> bool {
        self.wait_for(&self.watermark(), timeout)
    }

    /// Remove and return every event with `timestamp <= cutoff`, in timestamp order.
    ///
    /// Later events stay buffered. Each producer appends in timestamp order, but
    /// the keyboard and mouse producers interleave, so the whole queue is scanned
    /// rather than only its prefix. The sort is stable: equal timestamps keep
    /// their append order.
    pub fn drain_up_to(&self, cutoff: f64) -> Vec<InputEvent> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return Vec::new();
        }

        let mut drained = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for event in queue.drain(..) {
            if event.timestamp <= cutoff {
                drained.push(event);
            } else {
                kept.push_back(event);
            }
        }
        *queue = kept;
        drop(queue);

        drained.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        drained
    }

    /// Remove and return everything, in timestamp order.
    pub fn drain_all(&self) -> Vec<InputEvent> {
        let mut drained: Vec<InputEvent> = std::mem::take(&mut *self.queue.lock()).into();
        drained.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        drained
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
