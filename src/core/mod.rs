//! The capture-and-attribution pipeline.
//!
//! This module contains:
//! - The shared event buffer between listeners and the frame loop
//! - The session clock and the set-once stop signal
//! - Frame/event attribution and the fixed-rate frame loop
//! - Lock-free session counters

pub mod attribution;
pub mod buffer;
pub mod clock;
pub mod frame_loop;
pub mod stats;

// Re-export commonly used types
pub use attribution::{AttributedEvent, Attributor, FrameRecord};
pub use buffer::{EventBuffer, InputSource, Watermark};
pub use clock::{SessionClock, StopReason, StopSignal};
pub use frame_loop::{FrameClock, FrameLoopConfig, FrameLoopOutcome, LoopContext, TickError};
pub use stats::{SessionStats, SharedSessionStats, StatsSnapshot};
