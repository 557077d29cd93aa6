//! OS input hook backed by `rdev`.
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot be
//! cancelled, so the hook thread is detached and gated by an `active` flag.

use crate::collector::capture::{CollectorError, HookSink, InputHook};
use crate::collector::keys::normalize_key;
use crate::collector::types::{KeySym, MouseAction};
use parking_lot::Mutex;
use rdev::{Button, Event, EventType, Key};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, warn};

/// Input hook that listens to global keyboard and mouse events.
#[derive(Default)]
pub struct RdevHook {
    active: Arc<AtomicBool>,
    started: bool,
    /// Last pressed rdev key for each normalized name, used to release keys
    pressed: Arc<Mutex<HashMap<String, Key>>>,
}

impl RdevHook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputHook for RdevHook {
    fn install(&mut self, sink: HookSink) -> Result<(), CollectorError> {
        if self.started {
            return Err(CollectorError::AlreadyRunning);
        }
        self.started = true;
        self.active.store(true, Ordering::SeqCst);

        #[cfg(target_os = "macos")]
        rdev::set_is_main_thread(false);

        let active = self.active.clone();
        let pressed = self.pressed.clone();
        thread::Builder::new()
            .name("datagrab-hook".into())
            .spawn(move || {
                let mut position = (0.0_f64, 0.0_f64);
                let callback = move |event: Event| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    dispatch(&sink, &pressed, &mut position, event);
                };
                if let Err(e) = rdev::listen(callback) {
                    error!("input hook stopped: {e:?}");
                }
            })?;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn release_keys(&mut self, keys: &[String]) -> Result<(), CollectorError> {
        let pressed = self.pressed.lock();
        let mut failed = Vec::new();
        for name in keys {
            let Some(key) = pressed.get(name) else {
                warn!(key = %name, "no platform key recorded for held key");
                continue;
            };
            if rdev::simulate(&EventType::KeyRelease(*key)).is_err() {
                failed.push(name.clone());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CollectorError::ReleaseFailed(failed.join(", ")))
        }
    }
}

fn dispatch(
    sink: &HookSink,
    pressed: &Mutex<HashMap<String, Key>>,
    position: &mut (f64, f64),
    event: Event,
) {
    match event.event_type {
        EventType::KeyPress(key) => {
            let (sym, code) = key_sym(key);
            pressed.lock().insert(normalize_key(&sym), key);
            sink.on_key(sym, code, true);
        }
        EventType::KeyRelease(key) => {
            let (sym, code) = key_sym(key);
            sink.on_key(sym, code, false);
        }
        EventType::MouseMove { x, y } => {
            *position = (x, y);
            sink.on_mouse(MouseAction::Move { x, y });
        }
        EventType::ButtonPress(button) | EventType::ButtonRelease(button) => {
            let is_press = matches!(event.event_type, EventType::ButtonPress(_));
            sink.on_mouse(MouseAction::Button {
                x: position.0,
                y: position.1,
                button: button_name(button),
                pressed: is_press,
            });
        }
        EventType::Wheel { delta_x, delta_y } => {
            sink.on_mouse(MouseAction::Scroll {
                x: position.0,
                y: position.1,
                dx: delta_x,
                dy: delta_y,
            });
        }
    }
}

fn button_name(button: Button) -> String {
    match button {
        Button::Left => "left".to_string(),
        Button::Right => "right".to_string(),
        Button::Middle => "middle".to_string(),
        Button::Unknown(n) => format!("button{n}"),
    }
}

fn key_sym(key: Key) -> (KeySym, Option<u32>) {
    let named = |s: &str| (KeySym::Named(s.to_string()), None);
    let ch = |c: char| (KeySym::Char(c), None);
    match key {
        Key::Alt => named("alt"),
        Key::AltGr => named("alt_gr"),
        Key::Backspace => named("backspace"),
        Key::CapsLock => named("caps_lock"),
        Key::ControlLeft => named("ctrl_l"),
        Key::ControlRight => named("ctrl_r"),
        Key::Delete => named("delete"),
        Key::DownArrow => named("down"),
        Key::End => named("end"),
        Key::Escape => named("esc"),
        Key::F1 => named("f1"),
        Key::F2 => named("f2"),
        Key::F3 => named("f3"),
        Key::F4 => named("f4"),
        Key::F5 => named("f5"),
        Key::F6 => named("f6"),
        Key::F7 => named("f7"),
        Key::F8 => named("f8"),
        Key::F9 => named("f9"),
        Key::F10 => named("f10"),
        Key::F11 => named("f11"),
        Key::F12 => named("f12"),
        Key::Home => named("home"),
        Key::LeftArrow => named("left"),
        Key::MetaLeft => named("cmd"),
        Key::MetaRight => named("cmd_r"),
        Key::PageDown => named("page_down"),
        Key::PageUp => named("page_up"),
        Key::Return | Key::KpReturn => named("enter"),
        Key::RightArrow => named("right"),
        Key::ShiftLeft => named("shift"),
        Key::ShiftRight => named("shift_r"),
        Key::Space => named("space"),
        Key::Tab => named("tab"),
        Key::UpArrow => named("up"),
        Key::PrintScreen => named("print_screen"),
        Key::ScrollLock => named("scroll_lock"),
        Key::Pause => named("pause"),
        Key::NumLock => named("num_lock"),
        Key::Insert => named("insert"),
        Key::Function => named("fn"),
        Key::BackQuote => ch('`'),
        Key::Num1 | Key::Kp1 => ch('1'),
        Key::Num2 | Key::Kp2 => ch('2'),
        Key::Num3 | Key::Kp3 => ch('3'),
        Key::Num4 | Key::Kp4 => ch('4'),
        Key::Num5 | Key::Kp5 => ch('5'),
        Key::Num6 | Key::Kp6 => ch('6'),
        Key::Num7 | Key::Kp7 => ch('7'),
        Key::Num8 | Key::Kp8 => ch('8'),
        Key::Num9 | Key::Kp9 => ch('9'),
        Key::Num0 | Key::Kp0 => ch('0'),
        Key::Minus | Key::KpMinus => ch('-'),
        Key::Equal => ch('='),
        Key::KpPlus => ch('+'),
        Key::KpMultiply => ch('*'),
        Key::KpDivide | Key::Slash => ch('/'),
        Key::KpDelete => named("delete"),
        Key::KeyQ => ch('q'),
        Key::KeyW => ch('w'),
        Key::KeyE => ch('e'),
        Key::KeyR => ch('r'),
        Key::KeyT => ch('t'),
        Key::KeyY => ch('y'),
        Key::KeyU => ch('u'),
        Key::KeyI => ch('i'),
        Key::KeyO => ch('o'),
        Key::KeyP => ch('p'),
        Key::LeftBracket => ch('['),
        Key::RightBracket => ch(']'),
        Key::KeyA => ch('a'),
        Key::KeyS => ch('s'),
        Key::KeyD => ch('d'),
        Key::KeyF => ch('f'),
        Key::KeyG => ch('g'),
        Key::KeyH => ch('h'),
        Key::KeyJ => ch('j'),
        Key::KeyK => ch('k'),
        Key::KeyL => ch('l'),
        Key::SemiColon => ch(';'),
        Key::Quote => ch('\''),
        Key::BackSlash | Key::IntlBackslash => ch('\\'),
        Key::KeyZ => ch('z'),
        Key::KeyX => ch('x'),
        Key::KeyC => ch('c'),
        Key::KeyV => ch('v'),
        Key::KeyB => ch('b'),
        Key::KeyN => ch('n'),
        Key::KeyM => ch('m'),
        Key::Comma => ch(','),
        Key::Dot => ch('.'),
        Key::Unknown(code) => (KeySym::Code(code), Some(code)),
    }
}

/// rdev surfaces permission problems only when `listen` fails.
pub fn check_permission() -> bool {
    true
}
