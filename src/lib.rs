//! datagrab - synchronized screen and input recorder for computer-use datasets.
//!
//! A recording session captures one screenshot per tick at a fixed rate and
//! every keyboard and mouse event in between, then writes them to an
//! append-only log in which each event is bound to the frame that preceded it.
//! A separate validator re-checks a finished session from disk alone.
//!
//! # Attribution
//!
//! - Frame ids are dense, starting at 1; frame 1 is captured at session start
//! - Events observed in `(t(k), t(k+1)]` belong to frame `k`
//! - Mouse deltas are taken against the previous recorded mouse event
//! - Events after the last frame are flushed to it when the session stops
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────┐         │
//! │  │ Collector  │──▶│ EventBuffer │──▶│  FrameClock  │◀── Screen│
//! │  │ (kbd/mouse)│   │   (mutex)   │   │ (fixed rate) │         │
//! │  └────────────┘   └─────────────┘   └──────────────┘         │
//! │         │                                   │                │
//! │         ▼                                   ▼                │
//! │  ┌────────────┐                     ┌──────────────┐         │
//! │  │ StopSignal │                     │   Persist    │         │
//! │  │ (set once) │                     │ csv/png/json │         │
//! │  └────────────┘                     └──────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//!                                              │
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │  Validator   │
//!                                       └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use datagrab::collector::PlatformHook;
//! use datagrab::screen::open_platform_screen;
//! use datagrab::session::{Session, SessionConfig};
//!
//! let screen = open_platform_screen(1).expect("no screen");
//! let mut session = Session::new(SessionConfig::new("./dataset"));
//! let report = session
//!     .run(screen, &mut PlatformHook::new())
//!     .expect("recording failed");
//! println!("{}", report.summary);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod persist;
pub mod screen;
pub mod session;
pub mod validate;

// Re-export key types at crate root for convenience
pub use collector::{CollectorError, InputEvent, InputHook, StopKey};
pub use config::{Config, ConfigError};
pub use core::{EventBuffer, SessionClock, StopReason, StopSignal};
pub use persist::{PersistError, SessionLayout};
pub use screen::{CaptureError, ScreenSource};
pub use session::{Session, SessionConfig, SessionError, SessionReport, SessionState};
pub use validate::{validate_session, ValidateOptions, ValidationReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
