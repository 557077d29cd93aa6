//! No-op input hook.
//!
//! Used when the crate is built without the `native` feature so the recorder
//! still runs (frames only) without pulling in OS hook dependencies.

use crate::collector::capture::{CollectorError, HookSink, InputHook};

/// A hook that never emits events.
#[derive(Debug, Default)]
pub struct NoopHook {
    sink: Option<HookSink>,
}

impl NoopHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the hook is currently installed.
    pub fn is_installed(&self) -> bool {
        self.sink.is_some()
    }
}

impl InputHook for NoopHook {
    fn install(&mut self, sink: HookSink) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning);
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn uninstall(&mut self) {
        self.sink = None;
    }

    fn release_keys(&mut self, _keys: &[String]) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Without an OS hook there is no permission gate.
pub fn check_permission() -> bool {
    true
}
