//! Camera source with URL-scheme backend dispatch.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::ingest::frame_interval;

#[cfg(feature = "ingest-http")]
use crate::ingest::http::HttpCameraSource;
#[cfg(feature = "ingest-v4l2")]
use crate::ingest::v4l2::DeviceCameraSource;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL: `stub://...`, `http(s)://...`, or a local device path.
    pub url: String,
    /// Target frame rate. Sources decimate to this rate; 0 disables pacing.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://webcam".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// A capture device yielding BGR frames on demand.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
    #[cfg(feature = "ingest-http")]
    Http(HttpCameraSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCameraSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        let backend = if config.url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticCameraSource::new(config)?)
        } else if config.url.starts_with("http://") || config.url.starts_with("https://") {
            #[cfg(feature = "ingest-http")]
            {
                CameraBackend::Http(HttpCameraSource::new(config)?)
            }
            #[cfg(not(feature = "ingest-http"))]
            {
                return Err(anyhow!(
                    "camera url '{}' requires the ingest-http feature",
                    config.url
                ));
            }
        } else if !config.url.contains("://") {
            #[cfg(feature = "ingest-v4l2")]
            {
                CameraBackend::Device(DeviceCameraSource::new(config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(anyhow!(
                    "camera device '{}' requires the ingest-v4l2 feature",
                    config.url
                ));
            }
        } else {
            return Err(anyhow!(
                "unsupported camera url '{}'; expected stub://, http(s)://, or a device path",
                config.url
            ));
        };
        Ok(Self { backend })
    }

    /// Open the capture device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Capture the next frame. Any error is an acquisition failure; the
    /// pipeline treats it as end of stream.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub source: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

/// Synthetic BGR pattern frames. `stub://name?frames=N` bounds the stream
/// to N frames so end-of-stream handling can be exercised.
struct SyntheticCameraSource {
    config: CameraConfig,
    frame_count: u64,
    frame_limit: Option<u64>,
    scene_state: u8,
}

impl SyntheticCameraSource {
    fn new(config: CameraConfig) -> Result<Self> {
        let frame_limit = parse_frame_limit(&config.url)?;
        Ok(Self {
            config,
            frame_count: 0,
            frame_limit,
            scene_state: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!("synthetic stream ended after {} frames", limit));
            }
        }

        let interval = frame_interval(self.config.target_fps);
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::from_bgr(pixels, self.config.width, self.config.height)
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

fn parse_frame_limit(url: &str) -> Result<Option<u64>> {
    let Some(query) = url.split_once('?').map(|(_, q)| q) else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(("frames", value)) = pair.split_once('=') {
            let limit: u64 = value
                .parse()
                .map_err(|_| anyhow!("invalid frames bound '{}' in '{}'", value, url))?;
            return Ok(Some(limit));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(url: &str) -> CameraConfig {
        CameraConfig {
            url: url.to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_bgr_frames() {
        let mut source = CameraSource::new(stub_config("stub://test")).unwrap();
        source.connect().unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.as_bgr().len(), 64 * 48 * 3);
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[test]
    fn bounded_synthetic_source_ends() {
        let mut source = CameraSource::new(stub_config("stub://test?frames=2")).unwrap();
        source.connect().unwrap();

        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());
        // The failure is permanent.
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(CameraSource::new(stub_config("rtsp://camera-1")).is_err());
    }

    #[test]
    fn rejects_malformed_frame_bound() {
        assert!(CameraSource::new(stub_config("stub://test?frames=many")).is_err());
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = CameraSource::new(stub_config("stub://test")).unwrap();
        source.connect().unwrap();
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_ne!(a.as_bgr(), b.as_bgr());
    }
}
