//! Session-relative monotonic time and the cooperative stop signal.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock anchored at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    /// Start a clock at the current instant.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock started.
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StopKey,
    FlagFile,
    Signal,
    DurationCap,
}

impl StopReason {
    fn code(self) -> u8 {
        match self {
            StopReason::StopKey => 1,
            StopReason::FlagFile => 2,
            StopReason::Signal => 3,
            StopReason::DurationCap => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StopReason::StopKey),
            2 => Some(StopReason::FlagFile),
            3 => Some(StopReason::Signal),
            4 => Some(StopReason::DurationCap),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::StopKey => "stop key",
            StopReason::FlagFile => "stop flag file",
            StopReason::Signal => "termination signal",
            StopReason::DurationCap => "duration cap",
        };
        f.write_str(s)
    }
}

/// Set-once stop flag shared by every component of a session.
///
/// The first trigger wins and is never reset. Readers only consult it at tick
/// boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    reason: Arc<AtomicU8>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` if this call set it.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.reason
            .compare_exchange(0, reason.code(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.reason.load(Ordering::SeqCst) != 0
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_code(self.reason.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = SessionClock::start();
        let a = clock.now();
        let b = clock.now();
        assert!(a >= 0.0);
        assert!(b >= a);
    }

    #[test]
    fn test_first_trigger_wins() {
        let signal = StopSignal::new();
        assert!(!signal.is_set());
        assert_eq!(signal.reason(), None);

        assert!(signal.trigger(StopReason::StopKey));
        assert!(!signal.trigger(StopReason::Signal));

        let shared = signal.clone();
        assert!(shared.is_set());
        assert_eq!(shared.reason(), Some(StopReason::StopKey));
    }
}
