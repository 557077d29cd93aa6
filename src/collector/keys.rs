//! Key-name normalization and stop-key resolution.

use crate::collector::types::KeySym;
use std::fmt;
use tracing::warn;

/// Stop key used when the configured name cannot be resolved.
pub const DEFAULT_STOP_KEY: &str = "f10";

/// Map a raw hook key onto its canonical lowercase name.
///
/// Printable characters become single lowercase characters, named keys become
/// lowercase words and code-only keys render as `<code>`.
pub fn normalize_key(key: &KeySym) -> String {
    match key {
        KeySym::Char(' ') => "space".to_string(),
        KeySym::Char('\t') => "tab".to_string(),
        KeySym::Char('\r') | KeySym::Char('\n') => "enter".to_string(),
        KeySym::Char(c) => c.to_lowercase().collect(),
        KeySym::Named(name) => canonical_name(name),
        KeySym::Code(code) => format!("<{code}>"),
    }
}

fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let alias = match lower.as_str() {
        "escape" => "esc",
        "return" | "kp_return" => "enter",
        "pageup" => "page_up",
        "pagedown" => "page_down",
        "capslock" => "caps_lock",
        "control" | "control_l" => "ctrl_l",
        "control_r" => "ctrl_r",
        "altgr" => "alt_gr",
        "meta_l" | "super_l" => "cmd",
        "meta_r" | "super_r" => "cmd_r",
        "uparrow" => "up",
        "downarrow" => "down",
        "leftarrow" => "left",
        "rightarrow" => "right",
        _ => return lower,
    };
    alias.to_string()
}

/// Key that raises the session stop signal when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopKey {
    canonical: String,
}

impl StopKey {
    /// Resolve a stop-key name, rejecting anything unrecognized.
    pub fn parse(name: &str) -> Result<Self, String> {
        let lower = name.trim().to_lowercase();
        let canonical = match lower.as_str() {
            "esc" | "escape" => "esc".to_string(),
            "enter" | "return" => "enter".to_string(),
            "space" => "space".to_string(),
            _ if is_function_key(&lower) => lower,
            _ if lower.chars().count() == 1 => lower,
            _ => return Err(format!("unrecognized stop key: {name:?}")),
        };
        Ok(Self { canonical })
    }

    /// Resolve a stop-key name, falling back to F10 when it is not recognized.
    pub fn resolve(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|e| {
            warn!("{e}; falling back to {}", DEFAULT_STOP_KEY.to_uppercase());
            Self::default()
        })
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Whether a normalized key name is this stop key.
    pub fn matches(&self, key_name: &str) -> bool {
        self.canonical == key_name
    }
}

impl Default for StopKey {
    fn default() -> Self {
        Self {
            canonical: DEFAULT_STOP_KEY.to_string(),
        }
    }
}

impl fmt::Display for StopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical.to_uppercase())
    }
}

fn is_function_key(name: &str) -> bool {
    name.strip_prefix('f')
        .and_then(|n| n.parse::<u8>().ok())
        .map(|n| (1..=24).contains(&n))
        .unwrap_or(false)
}
