//! Typed input events for the recorder.
//!
//! Events are created once by a listener thread and never mutated afterwards.
//! Timestamps are session-relative seconds sampled when the hook callback fired.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of an input event, as written to the `event_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    KeyDown,
    KeyUp,
    MouseMove,
    MouseClick,
    MouseScroll,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::KeyDown,
        EventKind::KeyUp,
        EventKind::MouseMove,
        EventKind::MouseClick,
        EventKind::MouseScroll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::KeyDown => "key_down",
            EventKind::KeyUp => "key_up",
            EventKind::MouseMove => "mouse_move",
            EventKind::MouseClick => "mouse_click",
            EventKind::MouseScroll => "mouse_scroll",
        }
    }

    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            EventKind::MouseMove | EventKind::MouseClick | EventKind::MouseScroll
        )
    }

    pub fn is_key(&self) -> bool {
        matches!(self, EventKind::KeyDown | EventKind::KeyUp)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// A canonical modifier token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Cmd,
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    /// Presentation order of the `modifiers` column.
    pub const ORDER: [Modifier; 4] = [Modifier::Cmd, Modifier::Ctrl, Modifier::Alt, Modifier::Shift];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Cmd => "cmd",
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
        }
    }

    /// Collapse left/right/generic key names onto one modifier.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "shift" | "shift_l" | "shift_r" => Some(Modifier::Shift),
            "ctrl" | "ctrl_l" | "ctrl_r" => Some(Modifier::Ctrl),
            "alt" | "alt_l" | "alt_r" | "alt_gr" | "option" => Some(Modifier::Alt),
            "cmd" | "cmd_l" | "cmd_r" | "super" | "meta" => Some(Modifier::Cmd),
            _ => None,
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Modifier::Cmd => 1,
            Modifier::Ctrl => 2,
            Modifier::Alt => 4,
            Modifier::Shift => 8,
        }
    }
}

/// Set of currently held modifiers.
///
/// Owned by the keyboard listener thread; rendered into each key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub fn insert(&mut self, m: Modifier) {
        self.0 |= m.bit();
    }

    pub fn remove(&mut self, m: Modifier) {
        self.0 &= !m.bit();
    }

    pub fn contains(&self, m: Modifier) -> bool {
        self.0 & m.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// `+`-joined tokens in the fixed order cmd, ctrl, alt, shift.
    pub fn render(&self) -> String {
        Modifier::ORDER
            .iter()
            .filter(|m| self.contains(**m))
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Mouse button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Down,
    Up,
}

impl ButtonAction {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            ButtonAction::Down
        } else {
            ButtonAction::Up
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonAction::Down => "down",
            ButtonAction::Up => "up",
        }
    }
}

/// Kind-specific data of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Key {
        key: String,
        key_code: Option<u32>,
        modifiers: String,
    },
    Move {
        x: i32,
        y: i32,
    },
    Click {
        x: i32,
        y: i32,
        button: String,
        action: ButtonAction,
    },
    Scroll {
        x: i32,
        y: i32,
        scroll_dx: i64,
        scroll_dy: i64,
    },
}

/// A normalized input event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Session-relative seconds at callback time
    pub timestamp: f64,
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl InputEvent {
    pub fn key(
        timestamp: f64,
        pressed: bool,
        key: impl Into<String>,
        key_code: Option<u32>,
        modifiers: &ModifierSet,
    ) -> Self {
        Self {
            timestamp,
            kind: if pressed {
                EventKind::KeyDown
            } else {
                EventKind::KeyUp
            },
            payload: EventPayload::Key {
                key: key.into(),
                key_code,
                modifiers: modifiers.render(),
            },
        }
    }

    pub fn mouse_move(timestamp: f64, x: i32, y: i32) -> Self {
        Self {
            timestamp,
            kind: EventKind::MouseMove,
            payload: EventPayload::Move { x, y },
        }
    }

    pub fn mouse_click(
        timestamp: f64,
        x: i32,
        y: i32,
        button: impl Into<String>,
        action: ButtonAction,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::MouseClick,
            payload: EventPayload::Click {
                x,
                y,
                button: button.into(),
                action,
            },
        }
    }

    pub fn mouse_scroll(timestamp: f64, x: i32, y: i32, scroll_dx: i64, scroll_dy: i64) -> Self {
        Self {
            timestamp,
            kind: EventKind::MouseScroll,
            payload: EventPayload::Scroll {
                x,
                y,
                scroll_dx,
                scroll_dy,
            },
        }
    }

    /// Absolute pointer position for mouse events.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self.payload {
            EventPayload::Move { x, y }
            | EventPayload::Click { x, y, .. }
            | EventPayload::Scroll { x, y, .. } => Some((x, y)),
            EventPayload::Key { .. } => None,
        }
    }
}

/// A key as reported by the input hook, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySym {
    /// A printable character
    Char(char),
    /// A named key such as `F10`, `Escape` or `shift_r`
    Named(String),
    /// A key known only by its platform code
    Code(u32),
}

/// Raw keyboard callback payload.
#[derive(Debug, Clone)]
pub struct RawKey {
    pub timestamp: f64,
    pub key: KeySym,
    pub code: Option<u32>,
    pub pressed: bool,
}

/// Raw mouse callback payload.
#[derive(Debug, Clone)]
pub enum MouseAction {
    Move { x: f64, y: f64 },
    Button { x: f64, y: f64, button: String, pressed: bool },
    Scroll { x: f64, y: f64, dx: i64, dy: i64 },
}

#[derive(Debug, Clone)]
pub struct RawMouse {
    pub timestamp: f64,
    pub action: MouseAction,
}
