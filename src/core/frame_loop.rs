//! The fixed-rate capture loop.
//!
//! ```text
//!   wait(next_capture) ──> grab ──> t_boundary ──> drain(<= t_boundary)
//!          ^                                             │
//!          │                     attribute to frame k <──┘
//!          │                             │
//!          └── stop? <── sync <── frame k+1 row <── image k+1 <── event rows
//! ```
//!
//! The loop is the only writer of the session log. It checks the stop signal
//! after every commit and while waiting for the next deadline, never in the
//! middle of a tick.

use crate::collector::capture::CollectorError;
use crate::collector::types::InputEvent;
use crate::core::attribution::Attributor;
use crate::core::buffer::EventBuffer;
use crate::core::clock::{SessionClock, StopReason, StopSignal};
use crate::core::stats::SharedSessionStats;
use crate::persist::{FrameStore, LogWriter, PersistError};
use crate::screen::{CaptureError, ScreenSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest single sleep while waiting for the next deadline.
const WAIT_SLICE: f64 = 0.005;

/// Wait for listeners to hand over callbacks stamped before a boundary
/// before logging that they lag.
const SETTLE_WARN: Duration = Duration::from_millis(50);

/// Further wait after the warning before the tick fails.
const SETTLE_LIMIT: Duration = Duration::from_secs(2);

/// Fatal failure of a tick. The tick's frame is not committed.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone)]
pub struct FrameLoopConfig {
    pub fps: u32,
    /// Session-time cap in seconds
    pub max_duration: Option<f64>,
    /// External stop flag, polled between ticks
    pub stop_flag: Option<PathBuf>,
    /// Log per-second diagnostics
    pub dev: bool,
}

impl FrameLoopConfig {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            max_duration: None,
            stop_flag: None,
            dev: false,
        }
    }

    fn period(&self) -> f64 {
        1.0 / f64::from(self.fps.max(1))
    }
}

/// State shared with the listener threads.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub buffer: Arc<EventBuffer>,
    pub clock: SessionClock,
    pub stop: StopSignal,
    pub stats: SharedSessionStats,
}

/// Result of a completed loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoopOutcome {
    pub frames: u64,
    pub events: u64,
    pub stop_reason: StopReason,
    /// Session time at which the loop finished
    pub elapsed: f64,
}

pub struct FrameClock<S: ScreenSource> {
    screen: S,
    ctx: LoopContext,
    log: LogWriter,
    store: FrameStore,
    config: FrameLoopConfig,
    attributor: Attributor,
    shape: Option<(u32, u32)>,
    events: u64,
    next_report: f64,
}

impl<S: ScreenSource> FrameClock<S> {
    pub fn new(
        screen: S,
        ctx: LoopContext,
        log: LogWriter,
        store: FrameStore,
        config: FrameLoopConfig,
    ) -> Self {
        Self {
            screen,
            ctx,
            log,
            store,
            config,
            attributor: Attributor::new(),
            shape: None,
            events: 0,
            next_report: 1.0,
        }
    }

    /// Run until a stop source fires, then flush the buffered tail.
    ///
    /// Frame 1 is captured immediately. A capture or persistence failure ends
    /// the loop with everything committed so far left intact on disk.
    pub fn run(mut self) -> Result<FrameLoopOutcome, TickError> {
        let dt = self.config.period();
        self.tick()?;
        let mut next_capture = dt;

        let reason = loop {
            if let Some(reason) = self.poll_stop() {
                break reason;
            }
            if let Some(reason) = self.wait_until(next_capture) {
                break reason;
            }
            self.tick()?;
            next_capture += dt;
            self.report();
        };

        let tail = self.flush_tail()?;
        let outcome = FrameLoopOutcome {
            frames: self.attributor.frame_id(),
            events: self.events,
            stop_reason: reason,
            elapsed: self.ctx.clock.now(),
        };
        info!(
            frames = outcome.frames,
            events = outcome.events,
            tail,
            %reason,
            "capture loop finished"
        );
        Ok(outcome)
    }

    /// Capture, attribute and commit one frame.
    fn tick(&mut self) -> Result<(), TickError> {
        let image = self.screen.grab()?;
        let t_boundary = self.ctx.clock.now();

        let actual = image.dimensions();
        match self.shape {
            None => self.shape = Some(actual),
            Some(expected) if expected != actual => {
                return Err(CaptureError::ShapeChanged { expected, actual }.into())
            }
            Some(_) => {}
        }

        // Nothing to attribute before frame 1 exists; early events wait for tick 2.
        if self.attributor.frame_id() > 0 {
            self.await_listeners(t_boundary)?;
            let drained = self.ctx.buffer.drain_up_to(t_boundary);
            self.write_events(drained)?;
        }

        let path = self.store.save(self.attributor.next_frame_id(), &image)?;
        let frame = self.attributor.commit_frame(t_boundary);
        self.log.append_frame(&frame, &path)?;
        self.log.sync()?;
        self.ctx.stats.record_frame();

        debug!(frame_id = frame.frame_id, t = t_boundary, "frame committed");
        Ok(())
    }

    /// Block until every callback announced before the boundary is buffered.
    ///
    /// A callback left in flight would be drained at the next boundary and
    /// bound to a frame that starts after it, so the tick fails instead.
    fn await_listeners(&self, t_boundary: f64) -> Result<(), TickError> {
        let mark = self.ctx.buffer.watermark();
        if self.ctx.buffer.wait_for(&mark, SETTLE_WARN) {
            return Ok(());
        }
        warn!(t = t_boundary, "input listeners lagging behind frame boundary");
        if self.ctx.buffer.wait_for(&mark, SETTLE_LIMIT) {
            return Ok(());
        }
        Err(CollectorError::Stalled(SETTLE_WARN + SETTLE_LIMIT).into())
    }

    fn write_events(&mut self, drained: Vec<InputEvent>) -> Result<u64, TickError> {
        let rows = self.attributor.attribute(drained);
        for row in &rows {
            self.log.append_event(row)?;
        }
        let written = rows.len() as u64;
        self.events += written;
        self.ctx.stats.record_events_written(written);
        Ok(written)
    }

    fn flush_tail(&mut self) -> Result<u64, TickError> {
        if !self.ctx.buffer.settle(SETTLE_LIMIT) {
            warn!("input listeners still busy at tail flush");
        }
        let tail = self.ctx.buffer.drain_all();
        let written = self.write_events(tail)?;
        self.log.sync()?;
        Ok(written)
    }

    /// Check every stop source, raising the shared signal for the local ones.
    fn poll_stop(&self) -> Option<StopReason> {
        if let Some(reason) = self.ctx.stop.reason() {
            return Some(reason);
        }
        if let Some(flag) = &self.config.stop_flag {
            if flag.exists() {
                info!(path = %flag.display(), "stop flag file found");
                self.ctx.stop.trigger(StopReason::FlagFile);
                return self.ctx.stop.reason();
            }
        }
        if let Some(cap) = self.config.max_duration {
            if self.ctx.clock.now() >= cap {
                self.ctx.stop.trigger(StopReason::DurationCap);
                return self.ctx.stop.reason();
            }
        }
        None
    }

    /// Sleep in short slices until `deadline`, returning early on a stop.
    fn wait_until(&self, deadline: f64) -> Option<StopReason> {
        loop {
            let remaining = deadline - self.ctx.clock.now();
            if remaining <= 0.0 {
                return None;
            }
            thread::sleep(Duration::from_secs_f64(remaining.min(WAIT_SLICE)));
            if let Some(reason) = self.poll_stop() {
                return Some(reason);
            }
        }
    }

    fn report(&mut self) {
        if !self.config.dev {
            return;
        }
        let now = self.ctx.clock.now();
        if now < self.next_report {
            return;
        }
        while self.next_report <= now {
            self.next_report += 1.0;
        }
        let frames = self.attributor.frame_id();
        info!(
            elapsed = now,
            frames,
            fps = frames as f64 / now.max(f64::EPSILON),
            events = self.events,
            buffered = self.ctx.buffer.len(),
            "recording"
        );
    }
}
