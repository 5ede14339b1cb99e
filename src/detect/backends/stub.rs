//! Stub detectors for tests and model-free deployments.
//!
//! Both stubs replay scripted per-frame results, so pipeline behaviour can
//! be pinned down without real models. With an empty script the object
//! stub reports nothing and the face stub reports exactly one face (the
//! alert-free case), which keeps a model-free daemon quiet.

use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::{FaceDetector, ObjectDetector};
use crate::detect::result::{Detection, FaceRegion};

/// Scripted object detector.
pub struct StubObjectDetector {
    script: VecDeque<Vec<Detection>>,
}

impl StubObjectDetector {
    /// Stub that never detects anything.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    /// Stub that replays one detection list per frame, then reports
    /// nothing once the script runs out.
    pub fn with_script<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl Default for StubObjectDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDetector for StubObjectDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

/// Scripted face detector.
pub struct StubFaceDetector {
    script: VecDeque<Vec<FaceRegion>>,
}

impl StubFaceDetector {
    /// Stub that always reports exactly one centered face.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    /// Stub that replays one face list per frame, then falls back to a
    /// single centered face once the script runs out.
    pub fn with_script<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Vec<FaceRegion>>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Convenience: replay per-frame face counts instead of full regions.
    pub fn with_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        Self::with_script(counts.into_iter().map(synthetic_faces))
    }
}

impl Default for StubFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for StubFaceDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceRegion>> {
        match self.script.pop_front() {
            Some(faces) => Ok(faces),
            None => Ok(vec![FaceRegion {
                x: width / 4,
                y: height / 4,
                w: width / 2,
                h: height / 2,
            }]),
        }
    }
}

fn synthetic_faces(count: usize) -> Vec<FaceRegion> {
    (0..count)
        .map(|i| FaceRegion {
            x: 10 + 60 * i as u32,
            y: 10,
            w: 48,
            h: 48,
        })
        .collect()
}
