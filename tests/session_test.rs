//! End-to-end recording tests with a scripted screen and an injected input hook.

use datagrab::collector::{CollectorError, HookSink, InputHook, KeySym, MouseAction};
use datagrab::screen::{CaptureError, MonitorInfo, ScreenSource, SyntheticScreen};
use datagrab::validate::{validate_session, ValidateOptions};
use datagrab::{Session, SessionConfig, SessionState, StopKey, StopReason};
use image::RgbImage;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Hook that hands its sink to the test and records released keys.
#[derive(Clone, Default)]
struct SharedHook {
    sink: Arc<Mutex<Option<HookSink>>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl SharedHook {
    fn with_sink(&self, f: impl FnOnce(&HookSink)) {
        if let Some(sink) = self.sink.lock().as_ref() {
            f(sink);
        }
    }
}

impl InputHook for SharedHook {
    fn install(&mut self, sink: HookSink) -> Result<(), CollectorError> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn uninstall(&mut self) {
        self.sink.lock().take();
    }

    fn release_keys(&mut self, keys: &[String]) -> Result<(), CollectorError> {
        self.released.lock().extend_from_slice(keys);
        Ok(())
    }
}

/// Synthetic screen that runs a callback inside every grab.
struct ScriptedScreen<F: FnMut(u64)> {
    inner: SyntheticScreen,
    grabs: u64,
    on_grab: F,
}

impl<F: FnMut(u64)> ScriptedScreen<F> {
    fn new(on_grab: F) -> Self {
        Self {
            inner: SyntheticScreen::new(16, 9),
            grabs: 0,
            on_grab,
        }
    }
}

impl<F: FnMut(u64)> ScreenSource for ScriptedScreen<F> {
    fn monitor(&self) -> &MonitorInfo {
        self.inner.monitor()
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        self.grabs += 1;
        (self.on_grab)(self.grabs);
        self.inner.grab()
    }
}

fn session_config(root: &Path, fps: u32) -> SessionConfig {
    SessionConfig {
        rec_id: "rec_test".into(),
        task: "fill in the form".into(),
        fps,
        operator: "tester".into(),
        // Upper bound so a broken stop path cannot hang the suite.
        max_duration: Some(10.0),
        ..SessionConfig::new(root)
    }
}

fn all_images() -> ValidateOptions {
    ValidateOptions {
        check_images: true,
        sample_frames: -1,
        ..ValidateOptions::default()
    }
}

#[test]
fn test_recorded_session_validates_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let driver = hook.clone();

    let screen = ScriptedScreen::new(move |grab| {
        if grab < 2 {
            return;
        }
        let n = grab as f64;
        driver.with_sink(|sink| {
            sink.on_mouse(MouseAction::Move {
                x: n * 10.0,
                y: n * 5.0,
            });
            if grab == 3 {
                sink.on_key(KeySym::Named("shift".into()), None, true);
            }
            if grab % 2 == 0 {
                sink.on_key(KeySym::Char('a'), Some(0), true);
                sink.on_key(KeySym::Char('a'), Some(0), false);
            }
            if grab == 8 {
                sink.on_key(KeySym::Named("F10".into()), None, true);
            }
        });
    });

    let mut session = Session::new(session_config(tmp.path(), 50));
    let report = session.run(screen, &mut hook).unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(report.stop_reason, StopReason::StopKey);
    assert_eq!(report.frames, 8);
    assert_eq!(report.events, 17);
    assert_eq!(report.stats.frames_captured, 8);
    assert_eq!(report.stats.events_written, 17);
    assert_eq!(*hook.released.lock(), vec!["shift", "f10"]);

    let dir = tmp.path().join("rec_test");
    assert!(!dir.join(".stop").exists());
    assert_eq!(
        std::fs::read_to_string(dir.join("task.txt")).unwrap(),
        "fill in the form\n"
    );
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["rec_id"], "rec_test");
    assert_eq!(meta["fps_target"], 50);
    assert_eq!(meta["stop_key"], "f10");
    assert_eq!(meta["operator"], "tester");
    assert_eq!(meta["monitor"]["width"], 16);

    let validation = validate_session(&dir, &all_images()).unwrap();
    assert!(validation.is_ok(), "{validation}");
    assert!(validation.warnings.is_empty(), "{validation}");
    assert_eq!(validation.summary.frames, 8);
    assert_eq!(validation.summary.events, 17);
    assert_eq!(validation.summary.mouse_events_checked, 7);
    assert_eq!(validation.summary.events_per_frame_min, 0);
    assert_eq!(validation.summary.reference_size, Some((16, 9)));
}

#[test]
fn test_busy_hook_threads_keep_attribution_consistent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let done = Arc::new(AtomicBool::new(false));
    let sent = Arc::new(AtomicU64::new(0));

    // Keyboard and mouse callbacks arrive from their own threads for the
    // whole session, so listener hand-off races every frame boundary.
    let drivers: Vec<_> = (0..2)
        .map(|device| {
            let hook = hook.clone();
            let done = done.clone();
            let sent = sent.clone();
            thread::spawn(move || {
                let mut n = 0u32;
                while !done.load(Ordering::SeqCst) {
                    hook.with_sink(|sink| {
                        if device == 0 {
                            sink.on_key(KeySym::Char('q'), None, n % 2 == 0);
                        } else {
                            let x = f64::from(n % 500);
                            sink.on_mouse(MouseAction::Move { x, y: 500.0 - x });
                        }
                        sent.fetch_add(1, Ordering::SeqCst);
                    });
                    n = n.wrapping_add(1);
                    if n % 64 == 0 {
                        thread::sleep(Duration::from_micros(200));
                    }
                }
            })
        })
        .collect();

    let config = SessionConfig {
        max_duration: Some(0.4),
        ..session_config(tmp.path(), 50)
    };
    let report = Session::new(config)
        .run(SyntheticScreen::new(8, 8), &mut hook)
        .unwrap();
    done.store(true, Ordering::SeqCst);
    for driver in drivers {
        driver.join().unwrap();
    }

    assert_eq!(report.stop_reason, StopReason::DurationCap);
    assert!(report.events > 0);
    assert!(sent.load(Ordering::SeqCst) >= report.events);

    let validation = validate_session(&tmp.path().join("rec_test"), &all_images()).unwrap();
    assert!(validation.is_ok(), "{validation}");
    assert_eq!(validation.summary.events as u64, report.events);
}

#[test]
fn test_stop_key_mid_tick_commits_that_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let driver = hook.clone();

    let screen = ScriptedScreen::new(move |grab| {
        if grab == 2 {
            driver.with_sink(|sink| sink.on_key(KeySym::Named("f10".into()), None, true));
        }
    });

    let mut session = Session::new(session_config(tmp.path(), 50));
    let report = session.run(screen, &mut hook).unwrap();

    assert_eq!(report.stop_reason, StopReason::StopKey);
    assert_eq!(report.frames, 2);
    let dir = tmp.path().join("rec_test");
    assert!(dir.join("frames/000002.png").exists());
    assert!(!dir.join("frames/000003.png").exists());
    assert!(validate_session(&dir, &all_images()).unwrap().is_ok());
}

#[test]
fn test_flag_file_stops_before_next_capture() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let mut session = Session::new(session_config(tmp.path(), 50));
    let flag = session.dir().join(".stop");

    let screen = ScriptedScreen::new(move |grab| {
        if grab == 1 {
            std::fs::write(&flag, b"").unwrap();
        }
    });
    let report = session.run(screen, &mut hook).unwrap();

    assert_eq!(report.stop_reason, StopReason::FlagFile);
    assert_eq!(report.frames, 1);
    assert!(!session.dir().join(".stop").exists());
}

#[test]
fn test_signal_stops_session() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let mut session = Session::new(session_config(tmp.path(), 50));
    let stop = session.stop_signal();

    let screen = ScriptedScreen::new(move |grab| {
        if grab == 3 {
            stop.trigger(StopReason::Signal);
        }
    });
    let report = session.run(screen, &mut hook).unwrap();

    assert_eq!(report.stop_reason, StopReason::Signal);
    assert_eq!(report.frames, 3);
}

#[test]
fn test_duration_cap() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let config = SessionConfig {
        max_duration: Some(0.15),
        ..session_config(tmp.path(), 20)
    };

    let report = Session::new(config)
        .run(SyntheticScreen::new(8, 8), &mut hook)
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::DurationCap);
    assert!(report.frames >= 1);
    assert!(report.elapsed >= 0.15);

    let validation = validate_session(&tmp.path().join("rec_test"), &all_images()).unwrap();
    assert!(validation.is_ok(), "{validation}");
    assert_eq!(validation.summary.frames as u64, report.frames);
}

#[test]
fn test_unknown_stop_key_falls_back() {
    let tmp = tempfile::tempdir().unwrap();
    let mut hook = SharedHook::default();
    let config = SessionConfig {
        stop_key: StopKey::resolve("hyper"),
        max_duration: Some(0.05),
        ..session_config(tmp.path(), 20)
    };

    Session::new(config)
        .run(SyntheticScreen::new(8, 8), &mut hook)
        .unwrap();

    let meta = std::fs::read_to_string(tmp.path().join("rec_test/meta.json")).unwrap();
    assert!(meta.contains("\"stop_key\": \"f10\""));
}
