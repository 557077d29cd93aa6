//! Input capture for the recorder.
//!
//! Raw keyboard and mouse callbacks arrive through an [`InputHook`] and are
//! normalized by two listener threads into [`InputEvent`]s.

pub mod capture;
pub mod keys;
pub mod types;

#[cfg(feature = "native")]
pub mod native;

#[cfg(not(feature = "native"))]
pub mod noop;

// Re-export commonly used types
pub use capture::{CollectorError, HookSink, InputCapture, InputHook, ListenerContext};
pub use keys::{normalize_key, StopKey, DEFAULT_STOP_KEY};
pub use types::{
    ButtonAction, EventKind, EventPayload, InputEvent, KeySym, Modifier, ModifierSet, MouseAction,
};

#[cfg(feature = "native")]
pub use native::{check_permission, RdevHook};

/// Platform-agnostic hook type alias
#[cfg(feature = "native")]
pub type PlatformHook = RdevHook;

#[cfg(not(feature = "native"))]
pub use noop::{check_permission, NoopHook};

/// Platform-agnostic hook type alias
#[cfg(not(feature = "native"))]
pub type PlatformHook = NoopHook;
