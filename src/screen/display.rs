//! Monitor capture backed by `xcap`.

use crate::screen::{CaptureError, MonitorInfo, ScreenSource};
use image::{DynamicImage, RgbImage};
use tracing::warn;
use xcap::Monitor;

pub struct XcapScreen {
    monitor: Monitor,
    info: MonitorInfo,
}

impl XcapScreen {
    /// Open the 1-based `index`th monitor, falling back to the first one.
    pub fn open(index: usize) -> Result<Self, CaptureError> {
        let mut monitors = Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoMonitor);
        }

        let position = match index.checked_sub(1).filter(|i| *i < monitors.len()) {
            Some(i) => i,
            None => {
                warn!(index, available = monitors.len(), "monitor not found, using monitor 1");
                0
            }
        };
        let monitor = monitors.swap_remove(position);
        let info = MonitorInfo {
            index: position + 1,
            name: monitor.name().to_string(),
            left: monitor.x(),
            top: monitor.y(),
            width: monitor.width(),
            height: monitor.height(),
        };
        Ok(Self { monitor, info })
    }
}

impl ScreenSource for XcapScreen {
    fn monitor(&self) -> &MonitorInfo {
        &self.info
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        let rgba = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        Ok(DynamicImage::ImageRgba8(rgba).into_rgb8())
    }
}
