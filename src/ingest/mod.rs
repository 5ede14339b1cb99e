//! Frame capture sources.
//!
//! The pipeline treats its source as opaque: open, read-next, close on
//! drop. Sources produce BGR `Frame`s and are responsible for frame
//! decimation to the configured rate.
//!
//! Available backends, selected by the camera URL:
//! - `stub://...` synthetic frames (tests, demos; always available)
//! - `http(s)://...` MJPEG/JPEG camera streams (feature: ingest-http)
//! - a plain device path such as `/dev/video0` (feature: ingest-v4l2)

mod camera;
#[cfg(feature = "ingest-http")]
mod http;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats};

use std::time::Duration;

pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(any(feature = "ingest-http", feature = "ingest-v4l2"))]
pub(crate) fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}
