//! Screen capture seam.
//!
//! The frame loop only sees [`ScreenSource`]: a monitor descriptor plus a
//! `grab` that returns an RGB raster whose dimensions stay fixed for a session.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "native")]
pub mod display;

#[cfg(feature = "native")]
pub use display::XcapScreen;

/// Errors raised while grabbing a frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no monitor available")]
    NoMonitor,
    #[error("screen capture failed: {0}")]
    Backend(String),
    #[error("frame size changed from {expected:?} to {actual:?}")]
    ShapeChanged {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// The monitor a session records, as written to the metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    /// 1-based monitor index
    pub index: usize,
    pub name: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A source of screen rasters.
pub trait ScreenSource {
    fn monitor(&self) -> &MonitorInfo;

    fn grab(&mut self) -> Result<RgbImage, CaptureError>;
}

impl<S: ScreenSource + ?Sized> ScreenSource for Box<S> {
    fn monitor(&self) -> &MonitorInfo {
        (**self).monitor()
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        (**self).grab()
    }
}

/// Generated frames of a fixed size.
///
/// Stands in for a real display when the `native` feature is off, and in tests.
#[derive(Debug, Clone)]
pub struct SyntheticScreen {
    info: MonitorInfo,
    grabs: u64,
}

impl SyntheticScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            info: MonitorInfo {
                index: 1,
                name: "synthetic".to_string(),
                left: 0,
                top: 0,
                width,
                height,
            },
            grabs: 0,
        }
    }

    /// Number of rasters produced so far.
    pub fn grabs(&self) -> u64 {
        self.grabs
    }
}

impl ScreenSource for SyntheticScreen {
    fn monitor(&self) -> &MonitorInfo {
        &self.info
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        self.grabs += 1;
        let shade = (self.grabs % 256) as u8;
        Ok(RgbImage::from_fn(self.info.width, self.info.height, |x, y| {
            Rgb([shade, (x % 256) as u8, (y % 256) as u8])
        }))
    }
}

/// Open the screen source for this build.
#[cfg(feature = "native")]
pub fn open_platform_screen(monitor_index: usize) -> Result<Box<dyn ScreenSource>, CaptureError> {
    Ok(Box::new(XcapScreen::open(monitor_index)?))
}

/// Open the screen source for this build.
#[cfg(not(feature = "native"))]
pub fn open_platform_screen(monitor_index: usize) -> Result<Box<dyn ScreenSource>, CaptureError> {
    tracing::warn!(
        monitor_index,
        "built without the `native` feature; recording a synthetic screen"
    );
    Ok(Box::new(SyntheticScreen::new(640, 360)))
}
