//! Session lifecycle: `idle -> recording -> stopping -> closed`.
//!
//! A [`Session`] is single-shot. It lays out the session directory, starts the
//! listener threads, runs the frame loop on the calling thread and always tears
//! the listeners down again, whether the loop ended cleanly or not.

use crate::collector::{CollectorError, InputCapture, InputHook, ListenerContext, StopKey};
use crate::core::{
    EventBuffer, FrameClock, FrameLoopConfig, LoopContext, SessionClock, SessionStats,
    SharedSessionStats, StatsSnapshot, StopReason, StopSignal, TickError,
};
use crate::persist::{write_task, FrameStore, LogWriter, PersistError, SessionLayout, SessionMetadata};
use crate::screen::{CaptureError, ScreenSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session was already started")]
    AlreadyStarted,
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<TickError> for SessionError {
    fn from(e: TickError) -> Self {
        match e {
            TickError::Capture(e) => SessionError::Capture(e),
            TickError::Collector(e) => SessionError::Collector(e),
            TickError::Persist(e) => SessionError::Persist(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopping,
    Closed,
}

/// Everything needed to record one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub dataset_root: PathBuf,
    pub rec_id: String,
    pub task: String,
    pub fps: u32,
    pub stop_key: StopKey,
    pub operator: String,
    /// Session-time cap in seconds
    pub max_duration: Option<f64>,
    pub dev: bool,
}

impl SessionConfig {
    pub fn new(dataset_root: impl Into<PathBuf>) -> Self {
        Self {
            dataset_root: dataset_root.into(),
            rec_id: default_rec_id(),
            task: String::new(),
            fps: 20,
            stop_key: StopKey::default(),
            operator: String::new(),
            max_duration: None,
            dev: false,
        }
    }
}

/// Default session id, from local time.
pub fn default_rec_id() -> String {
    chrono::Local::now().format("rec_%Y%m%d_%H%M%S").to_string()
}

/// What a closed session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub rec_id: String,
    pub dir: PathBuf,
    pub frames: u64,
    pub events: u64,
    pub stop_reason: StopReason,
    pub elapsed: f64,
    pub stats: StatsSnapshot,
    pub summary: String,
}

pub struct Session {
    config: SessionConfig,
    layout: SessionLayout,
    state: SessionState,
    stop: StopSignal,
    stats: SharedSessionStats,
}

impl Session {
    pub fn new(mut config: SessionConfig) -> Self {
        config.fps = config.fps.max(1);
        let layout = SessionLayout::new(&config.dataset_root, &config.rec_id);
        Self {
            config,
            layout,
            state: SessionState::Idle,
            stop: StopSignal::new(),
            stats: Arc::new(SessionStats::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dir(&self) -> &Path {
        self.layout.dir()
    }

    /// Handle for raising a stop from outside, e.g. a signal handler.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Record until a stop source fires, then close the session.
    pub fn run<S, H>(&mut self, screen: S, hook: &mut H) -> Result<SessionReport, SessionError>
    where
        S: ScreenSource,
        H: InputHook + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.state = SessionState::Recording;
        let result = self.record(screen, hook);
        self.state = SessionState::Closed;
        result
    }

    fn record<S, H>(&mut self, screen: S, hook: &mut H) -> Result<SessionReport, SessionError>
    where
        S: ScreenSource,
        H: InputHook + ?Sized,
    {
        let layout = self.layout.clone();
        layout.create_dirs().map_err(PersistError::from)?;
        if layout.remove_stop_flag().map_err(PersistError::from)? {
            warn!(path = %layout.stop_flag_path().display(), "removed stale stop flag");
        }

        let meta = SessionMetadata::new(
            &self.config.rec_id,
            self.config.fps,
            screen.monitor().clone(),
            self.config.stop_key.canonical(),
            &self.config.operator,
        );
        meta.write_once(&layout.meta_path())?;
        write_task(&layout.task_path(), &self.config.task)?;
        let log = LogWriter::create(&layout.log_path())?;

        let buffer = Arc::new(EventBuffer::new());
        let clock = SessionClock::start();
        let mut capture = InputCapture::start(
            hook,
            clock,
            ListenerContext {
                buffer: buffer.clone(),
                stop: self.stop.clone(),
                stop_key: self.config.stop_key.clone(),
                stats: self.stats.clone(),
            },
        )?;

        info!(
            rec_id = %self.config.rec_id,
            dir = %layout.dir().display(),
            fps = self.config.fps,
            stop_key = %self.config.stop_key,
            "recording started"
        );

        let loop_config = FrameLoopConfig {
            max_duration: self.config.max_duration,
            stop_flag: Some(layout.stop_flag_path()),
            dev: self.config.dev,
            ..FrameLoopConfig::new(self.config.fps)
        };
        let ctx = LoopContext {
            buffer,
            clock,
            stop: self.stop.clone(),
            stats: self.stats.clone(),
        };
        let outcome = FrameClock::new(screen, ctx, log, FrameStore::new(&layout), loop_config).run();

        self.state = SessionState::Stopping;
        self.teardown(&mut capture, hook);

        let outcome = outcome?;
        let stats = self.stats.snapshot();
        let summary = self.stats.summary(outcome.elapsed);
        info!(
            frames = outcome.frames,
            events = outcome.events,
            reason = %outcome.stop_reason,
            "session closed"
        );

        Ok(SessionReport {
            rec_id: self.config.rec_id.clone(),
            dir: layout.dir().to_path_buf(),
            frames: outcome.frames,
            events: outcome.events,
            stop_reason: outcome.stop_reason,
            elapsed: outcome.elapsed,
            stats,
            summary,
        })
    }

    /// Stop listeners, release held keys and remove the stop flag.
    fn teardown<H: InputHook + ?Sized>(&self, capture: &mut InputCapture, hook: &mut H) {
        let held = capture.stop();
        if !held.is_empty() {
            info!(keys = ?held, "releasing held keys");
            if let Err(e) = hook.release_keys(&held) {
                warn!(error = %e, "could not release held keys");
            }
        }
        hook.uninstall();

        if let Err(e) = self.layout.remove_stop_flag() {
            warn!(error = %e, "could not remove stop flag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::HookSink;
    use crate::screen::SyntheticScreen;

    #[derive(Default)]
    struct RecordingHook {
        installed: bool,
        released: Vec<String>,
    }

    impl InputHook for RecordingHook {
        fn install(&mut self, _sink: HookSink) -> Result<(), CollectorError> {
            self.installed = true;
            Ok(())
        }

        fn uninstall(&mut self) {
            self.installed = false;
        }

        fn release_keys(&mut self, keys: &[String]) -> Result<(), CollectorError> {
            self.released.extend_from_slice(keys);
            Ok(())
        }
    }

    fn config(root: &Path) -> SessionConfig {
        SessionConfig {
            rec_id: "rec_test".into(),
            max_duration: Some(0.1),
            fps: 50,
            ..SessionConfig::new(root)
        }
    }

    #[test]
    fn test_session_is_single_shot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(tmp.path()));
        let mut hook = RecordingHook::default();
        assert_eq!(session.state(), SessionState::Idle);

        let report = session.run(SyntheticScreen::new(4, 4), &mut hook).unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(report.stop_reason, StopReason::DurationCap);
        assert!(report.frames >= 1);
        assert!(report.summary.contains("Frames captured"));
        assert!(!hook.installed);

        let again = session.run(SyntheticScreen::new(4, 4), &mut hook);
        assert!(matches!(again, Err(SessionError::AlreadyStarted)));
    }

    #[test]
    fn test_existing_session_is_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let mut hook = RecordingHook::default();
        Session::new(config(tmp.path()))
            .run(SyntheticScreen::new(4, 4), &mut hook)
            .unwrap();

        let result = Session::new(config(tmp.path())).run(SyntheticScreen::new(4, 4), &mut hook);
        assert!(matches!(
            result,
            Err(SessionError::Persist(PersistError::MetadataExists(_)))
        ));
    }

    #[test]
    fn test_stale_stop_flag_is_cleared() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rec_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".stop"), b"").unwrap();

        let mut hook = RecordingHook::default();
        let report = Session::new(config(tmp.path()))
            .run(SyntheticScreen::new(4, 4), &mut hook)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::DurationCap);
        assert!(!dir.join(".stop").exists());
    }

    #[test]
    fn test_zero_fps_is_recorded_as_one() {
        let tmp = tempfile::tempdir().unwrap();
        let mut hook = RecordingHook::default();
        let config = SessionConfig {
            fps: 0,
            max_duration: Some(0.05),
            ..config(tmp.path())
        };
        Session::new(config)
            .run(SyntheticScreen::new(4, 4), &mut hook)
            .unwrap();

        let meta = std::fs::read_to_string(tmp.path().join("rec_test/meta.json")).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
        assert_eq!(meta["fps_target"], 1);
    }
}
