//! Detector seams.
//!
//! Both detectors are pretrained, frozen, external collaborators: loaded
//! once at process start, reused for every frame, never retrained. The
//! pipeline only sees these traits, which keeps it testable with
//! substitutable stub detectors.

use anyhow::Result;

use crate::detect::result::{Detection, FaceRegion};

/// Full-frame object detector.
///
/// Receives interleaved RGB bytes and reports (box, label index, score)
/// triples. Implementations must treat the pixel slice as read-only and
/// ephemeral; inference runs without gradient computation.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook (model load, first-inference JIT).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Frontal-face detector.
///
/// Receives greyscale bytes and reports face bounding regions. The
/// pipeline only counts them.
pub trait FaceDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one greyscale frame.
    fn detect(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceRegion>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
