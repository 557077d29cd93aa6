//! Keyboard and mouse listener threads.
//!
//! The OS hook is reached only through [`InputHook`]. It reports raw callbacks
//! into a [`HookSink`], which stamps them with the session clock and hands them
//! to one of two listener threads. The listeners normalize callbacks into
//! [`InputEvent`]s and append them to the shared [`EventBuffer`].

use crate::collector::keys::{normalize_key, StopKey};
use crate::collector::types::{
    ButtonAction, InputEvent, KeySym, Modifier, ModifierSet, MouseAction, RawKey, RawMouse,
};
use crate::core::buffer::{EventBuffer, InputSource};
use crate::core::clock::{SessionClock, StopReason, StopSignal};
use crate::core::stats::SharedSessionStats;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a listener waits for a callback before re-checking its run flag.
const LISTENER_POLL: Duration = Duration::from_millis(100);

/// Errors that can occur during input capture.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("input capture is already running")]
    AlreadyRunning,
    #[error("failed to install input hook: {0}")]
    HookFailed(String),
    #[error("failed to release held keys: {0}")]
    ReleaseFailed(String),
    #[error("input listeners fell behind by more than {0:?}")]
    Stalled(Duration),
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Capability handed to the OS hook: one entry point per device.
///
/// Timestamps are sampled here, at callback time, not when the listener
/// thread gets around to the event. Announce, stamp and send happen under the
/// device's lock, so each channel carries callbacks in announce order even
/// when the hook calls in from several threads.
#[derive(Debug, Clone)]
pub struct HookSink {
    clock: SessionClock,
    buffer: Arc<EventBuffer>,
    keys: Arc<Mutex<Sender<RawKey>>>,
    mouse: Arc<Mutex<Sender<RawMouse>>>,
}

impl HookSink {
    pub fn on_key(&self, key: KeySym, code: Option<u32>, pressed: bool) {
        let keys = self.keys.lock();
        self.buffer.announce(InputSource::Keyboard);
        let raw = RawKey {
            timestamp: self.clock.now(),
            key,
            code,
            pressed,
        };
        // A closed channel means capture is shutting down.
        if keys.send(raw).is_err() {
            self.buffer.abandon(InputSource::Keyboard, 1);
        }
    }

    pub fn on_mouse(&self, action: MouseAction) {
        let mouse = self.mouse.lock();
        self.buffer.announce(InputSource::Mouse);
        let raw = RawMouse {
            timestamp: self.clock.now(),
            action,
        };
        if mouse.send(raw).is_err() {
            self.buffer.abandon(InputSource::Mouse, 1);
        }
    }
}

/// An OS-level input hook.
pub trait InputHook: Send {
    /// Start delivering callbacks into `sink`.
    fn install(&mut self, sink: HookSink) -> Result<(), CollectorError>;

    /// Stop delivering callbacks.
    fn uninstall(&mut self);

    /// Send key-up for each normalized key name still held at session close.
    fn release_keys(&mut self, keys: &[String]) -> Result<(), CollectorError>;
}

/// Shared state the listeners write into.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    pub buffer: Arc<EventBuffer>,
    pub stop: StopSignal,
    pub stop_key: StopKey,
    pub stats: SharedSessionStats,
}

/// Running pair of listener threads.
pub struct InputCapture {
    running: Arc<AtomicBool>,
    keyboard: Option<JoinHandle<Vec<String>>>,
    mouse: Option<JoinHandle<()>>,
}

impl InputCapture {
    /// Spawn both listeners and install the hook.
    pub fn start<H: InputHook + ?Sized>(
        hook: &mut H,
        clock: SessionClock,
        ctx: ListenerContext,
    ) -> Result<Self, CollectorError> {
        let (key_tx, key_rx) = unbounded();
        let (mouse_tx, mouse_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let mut capture = Self {
            running: running.clone(),
            keyboard: None,
            mouse: None,
        };

        let buffer = ctx.buffer.clone();
        let keyboard = KeyboardListener::new(ctx.clone());
        let r = running.clone();
        capture.keyboard = Some(
            thread::Builder::new()
                .name("datagrab-keyboard".into())
                .spawn(move || keyboard.run(key_rx, r))?,
        );

        let mouse = MouseListener::new(ctx);
        let r = running;
        capture.mouse = Some(
            thread::Builder::new()
                .name("datagrab-mouse".into())
                .spawn(move || mouse.run(mouse_rx, r))?,
        );

        let sink = HookSink {
            clock,
            buffer,
            keys: Arc::new(Mutex::new(key_tx)),
            mouse: Arc::new(Mutex::new(mouse_tx)),
        };
        if let Err(e) = hook.install(sink) {
            capture.stop();
            return Err(e);
        }

        debug!("input listeners started");
        Ok(capture)
    }

    /// Whether the listener threads are still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both listeners and return the keys still held down.
    pub fn stop(&mut self) -> Vec<String> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.mouse.take() {
            if handle.join().is_err() {
                warn!("mouse listener panicked");
            }
        }

        match self.keyboard.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("keyboard listener panicked");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }
}

impl Drop for InputCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keyboard listener: owns the held-modifier and held-key state.
struct KeyboardListener {
    ctx: ListenerContext,
    modifiers: ModifierSet,
    held: Vec<String>,
}

impl KeyboardListener {
    fn new(ctx: ListenerContext) -> Self {
        Self {
            ctx,
            modifiers: ModifierSet::default(),
            held: Vec::new(),
        }
    }

    fn run(mut self, rx: Receiver<RawKey>, running: Arc<AtomicBool>) -> Vec<String> {
        let buffer = self.ctx.buffer.clone();
        listen(&rx, &running, &buffer, InputSource::Keyboard, |raw| {
            self.handle(raw)
        });
        self.held
    }

    fn handle(&mut self, raw: RawKey) {
        let name = normalize_key(&raw.key);

        if let Some(modifier) = Modifier::from_key_name(&name) {
            if raw.pressed {
                self.modifiers.insert(modifier);
            } else {
                self.modifiers.remove(modifier);
            }
        }

        if raw.pressed {
            if !self.held.contains(&name) {
                self.held.push(name.clone());
            }
        } else {
            self.held.retain(|k| k != &name);
        }

        // Raised before the append, so a settled buffer implies a visible stop.
        if raw.pressed
            && self.ctx.stop_key.matches(&name)
            && self.ctx.stop.trigger(StopReason::StopKey)
        {
            info!(key = %self.ctx.stop_key, "stop key pressed");
        }

        let event = InputEvent::key(raw.timestamp, raw.pressed, name, raw.code, &self.modifiers);
        self.ctx.buffer.land(InputSource::Keyboard, event);
        self.ctx.stats.record_key_event();
    }
}

/// Mouse listener: stateless translation of pointer callbacks.
struct MouseListener {
    ctx: ListenerContext,
}

impl MouseListener {
    fn new(ctx: ListenerContext) -> Self {
        Self { ctx }
    }

    fn run(self, rx: Receiver<RawMouse>, running: Arc<AtomicBool>) {
        listen(&rx, &running, &self.ctx.buffer, InputSource::Mouse, |raw| {
            self.handle(raw)
        });
    }

    fn handle(&self, raw: RawMouse) {
        let event = match raw.action {
            MouseAction::Move { x, y } => InputEvent::mouse_move(raw.timestamp, x as i32, y as i32),
            MouseAction::Button {
                x,
                y,
                button,
                pressed,
            } => InputEvent::mouse_click(
                raw.timestamp,
                x as i32,
                y as i32,
                button,
                ButtonAction::from_pressed(pressed),
            ),
            MouseAction::Scroll { x, y, dx, dy } => {
                InputEvent::mouse_scroll(raw.timestamp, x as i32, y as i32, dx, dy)
            }
        };
        self.ctx.buffer.land(InputSource::Mouse, event);
        self.ctx.stats.record_mouse_event();
    }
}

fn listen<T>(
    rx: &Receiver<T>,
    running: &AtomicBool,
    buffer: &EventBuffer,
    source: InputSource,
    mut handle: impl FnMut(T),
) {
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(LISTENER_POLL) {
            Ok(raw) => handle(raw),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let dropped = rx.try_iter().count();
    if dropped > 0 {
        buffer.abandon(source, dropped as u64);
        debug!(dropped, "discarded callbacks received after shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{EventKind, EventPayload};
    use crate::core::stats::SessionStats;
    use std::time::Instant;

    #[derive(Default)]
    struct CapturingHook {
        sink: Arc<Mutex<Option<HookSink>>>,
    }

    impl InputHook for CapturingHook {
        fn install(&mut self, sink: HookSink) -> Result<(), CollectorError> {
            *self.sink.lock() = Some(sink);
            Ok(())
        }

        fn uninstall(&mut self) {
            self.sink.lock().take();
        }

        fn release_keys(&mut self, _keys: &[String]) -> Result<(), CollectorError> {
            Ok(())
        }
    }

    fn context() -> ListenerContext {
        ListenerContext {
            buffer: Arc::new(EventBuffer::new()),
            stop: StopSignal::new(),
            stop_key: StopKey::resolve("F10"),
            stats: Arc::new(SessionStats::new()),
        }
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_modifiers_and_stop_key() {
        let ctx = context();
        let mut hook = CapturingHook::default();
        let mut capture = InputCapture::start(&mut hook, SessionClock::start(), ctx.clone()).unwrap();
        let sink = hook.sink.lock().clone().unwrap();

        sink.on_key(KeySym::Named("shift_r".into()), None, true);
        sink.on_key(KeySym::Named("ctrl_l".into()), None, true);
        sink.on_key(KeySym::Char('A'), Some(0), true);
        sink.on_key(KeySym::Named("F10".into()), None, true);

        wait_for(|| ctx.buffer.len() == 4);
        assert!(ctx.stop.is_set());
        assert_eq!(ctx.stop.reason(), Some(StopReason::StopKey));

        let held = capture.stop();
        assert_eq!(held, vec!["shift_r", "ctrl_l", "a", "f10"]);

        let events = ctx.buffer.drain_all();
        assert_eq!(events.len(), 4);
        match &events[2].payload {
            EventPayload::Key {
                key,
                key_code,
                modifiers,
            } => {
                assert_eq!(key, "a");
                assert_eq!(*key_code, Some(0));
                assert_eq!(modifiers, "ctrl+shift");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(ctx.stats.snapshot().key_events, 4);
    }

    #[test]
    fn test_release_clears_held_keys() {
        let ctx = context();
        let mut hook = CapturingHook::default();
        let mut capture = InputCapture::start(&mut hook, SessionClock::start(), ctx.clone()).unwrap();
        let sink = hook.sink.lock().clone().unwrap();

        sink.on_key(KeySym::Named("shift".into()), None, true);
        sink.on_key(KeySym::Char('x'), None, true);
        sink.on_key(KeySym::Named("shift".into()), None, false);

        wait_for(|| ctx.buffer.len() == 3);
        assert_eq!(capture.stop(), vec!["x"]);
        assert!(!ctx.stop.is_set());

        let events = ctx.buffer.drain_all();
        assert_eq!(events[2].kind, EventKind::KeyUp);
        match &events[2].payload {
            EventPayload::Key { modifiers, .. } => assert_eq!(modifiers, ""),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_mouse_callbacks_are_normalized() {
        let ctx = context();
        let mut hook = CapturingHook::default();
        let mut capture = InputCapture::start(&mut hook, SessionClock::start(), ctx.clone()).unwrap();
        let sink = hook.sink.lock().clone().unwrap();

        sink.on_mouse(MouseAction::Move { x: 10.7, y: 20.2 });
        sink.on_mouse(MouseAction::Button {
            x: 10.0,
            y: 20.0,
            button: "left".into(),
            pressed: false,
        });
        sink.on_mouse(MouseAction::Scroll {
            x: 10.0,
            y: 20.0,
            dx: 0,
            dy: -2,
        });

        wait_for(|| ctx.buffer.len() == 3);
        capture.stop();

        let events = ctx.buffer.drain_all();
        assert_eq!(events[0].position(), Some((10, 20)));
        assert_eq!(events[1].kind, EventKind::MouseClick);
        assert_eq!(
            events[1].payload,
            EventPayload::Click {
                x: 10,
                y: 20,
                button: "left".into(),
                action: ButtonAction::Up
            }
        );
        assert_eq!(events[2].kind, EventKind::MouseScroll);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
