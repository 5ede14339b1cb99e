//! Load-once inference context.
//!
//! Holds the two frozen detector models plus the detection policy, built
//! once at process start and shared by every stream. Replaces ambient
//! module-level model state: the context is injected into pipelines, so
//! tests can substitute stub detectors.

use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::alert::{MULTIPLE_FACES_ALERT, NO_FACE_ALERT, PROHIBITED_PREFIX};
use crate::detect::backend::{FaceDetector, ObjectDetector};
use crate::detect::classes;
use crate::frame::Frame;

/// What counts as a violation.
#[derive(Clone, Debug)]
pub struct DetectionPolicy {
    /// Detections at or below this confidence are ignored (strict `>`).
    pub confidence_threshold: f32,
    /// Class names that trigger the prohibited-objects alert.
    pub prohibited_classes: Vec<String>,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            prohibited_classes: classes::DEFAULT_PROHIBITED_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// The two detectors plus policy, behind locks so concurrent streams can
/// share one context (detectors take `&mut self`).
pub struct InferenceContext {
    object: Mutex<Box<dyn ObjectDetector>>,
    face: Mutex<Box<dyn FaceDetector>>,
    policy: DetectionPolicy,
}

impl InferenceContext {
    pub fn new(
        object: Box<dyn ObjectDetector>,
        face: Box<dyn FaceDetector>,
        policy: DetectionPolicy,
    ) -> Self {
        Self {
            object: Mutex::new(object),
            face: Mutex::new(face),
            policy,
        }
    }

    /// Build the context the daemon was configured for. `width`/`height`
    /// are the camera frame dimensions (full-frame models are exported for
    /// a fixed input size).
    #[cfg_attr(not(feature = "backend-tract"), allow(unused_variables))]
    pub fn from_settings(
        settings: &crate::config::DetectionSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        use crate::detect::backends::{StubFaceDetector, StubObjectDetector};

        let policy = DetectionPolicy {
            confidence_threshold: settings.confidence_threshold,
            prohibited_classes: settings.prohibited_classes.clone(),
        };
        match settings.backend.as_str() {
            "stub" => Ok(Self::new(
                Box::new(StubObjectDetector::new()),
                Box::new(StubFaceDetector::new()),
                policy,
            )),
            "tract" => {
                #[cfg(feature = "backend-tract")]
                {
                    use crate::detect::backends::{TractObjectDetector, TractWindowClassifier};
                    use crate::detect::cascade::{CascadeDetector, CascadeParams};

                    let object_model = settings
                        .object_model
                        .as_ref()
                        .ok_or_else(|| anyhow!("tract backend requires detection.object_model"))?;
                    let face_model = settings
                        .face_model
                        .as_ref()
                        .ok_or_else(|| anyhow!("tract backend requires detection.face_model"))?;

                    let object = TractObjectDetector::new(object_model, width, height)?;
                    let classifier =
                        TractWindowClassifier::new(face_model, settings.face_window)?;
                    let face = CascadeDetector::new(
                        Box::new(classifier),
                        CascadeParams {
                            scale_factor: settings.scale_factor,
                            min_neighbors: settings.min_neighbors,
                            ..CascadeParams::default()
                        },
                    )?;
                    Ok(Self::new(Box::new(object), Box::new(face), policy))
                }
                #[cfg(not(feature = "backend-tract"))]
                {
                    Err(anyhow!(
                        "detection backend 'tract' requires the backend-tract feature"
                    ))
                }
            }
            other => Err(anyhow!(
                "unknown detection backend '{}'; expected stub or tract",
                other
            )),
        }
    }

    pub fn policy(&self) -> &DetectionPolicy {
        &self.policy
    }

    /// Run both detectors' warm-up hooks.
    pub fn warm_up(&self) -> Result<()> {
        self.lock_object()?.warm_up()?;
        self.lock_face()?.warm_up()?;
        Ok(())
    }

    /// Analyze one frame and return its alerts, in policy order:
    /// prohibited-objects alert (0 or 1) then face-presence alert (0 or 1).
    ///
    /// Pure with respect to the alert log and the frame: this never appends
    /// and never draws. Deterministic for a fixed frame and fixed models.
    pub fn analyze(&self, frame: &Frame) -> Result<Vec<String>> {
        let mut alerts = Vec::new();

        // Object detection runs on RGB.
        let rgb = frame.to_rgb();
        let detections = self
            .lock_object()?
            .detect(&rgb, frame.width(), frame.height())?;

        // Keep detector output order; no dedup, no sort.
        let prohibited: Vec<&str> = detections
            .iter()
            .filter(|d| d.score > self.policy.confidence_threshold)
            .filter_map(|d| d.class_name())
            .filter(|name| self.policy.prohibited_classes.iter().any(|p| p == name))
            .collect();
        if !prohibited.is_empty() {
            alerts.push(format!("{}{}", PROHIBITED_PREFIX, prohibited.join(", ")));
        }

        // Face presence runs on greyscale.
        let gray = frame.to_gray();
        let faces = self
            .lock_face()?
            .detect(&gray, frame.width(), frame.height())?;
        match faces.len() {
            0 => alerts.push(NO_FACE_ALERT.to_string()),
            1 => {}
            _ => alerts.push(MULTIPLE_FACES_ALERT.to_string()),
        }

        Ok(alerts)
    }

    fn lock_object(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn ObjectDetector>>> {
        self.object
            .lock()
            .map_err(|_| anyhow!("object detector lock poisoned"))
    }

    fn lock_face(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn FaceDetector>>> {
        self.face
            .lock()
            .map_err(|_| anyhow!("face detector lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{StubFaceDetector, StubObjectDetector};
    use crate::detect::result::Detection;

    fn detection(class_index: usize, score: f32) -> Detection {
        Detection {
            x1: 0.0,
            y1: 0.0,
            x2: 32.0,
            y2: 32.0,
            class_index,
            score,
        }
    }

    fn frame() -> Frame {
        Frame::from_bgr(vec![0u8; 64 * 48 * 3], 64, 48).unwrap()
    }

    fn context_with(
        object: StubObjectDetector,
        face: StubFaceDetector,
    ) -> InferenceContext {
        InferenceContext::new(
            Box::new(object),
            Box::new(face),
            DetectionPolicy::default(),
        )
    }

    #[test]
    fn one_face_and_nothing_prohibited_is_silent() {
        let ctx = context_with(StubObjectDetector::new(), StubFaceDetector::new());
        assert!(ctx.analyze(&frame()).unwrap().is_empty());
    }

    #[test]
    fn prohibited_alert_keeps_detector_order() {
        // cell phone @0.9 then book @0.6, as produced by the detector.
        let ctx = context_with(
            StubObjectDetector::with_script(vec![vec![
                detection(68, 0.9),
                detection(74, 0.6),
            ]]),
            StubFaceDetector::new(),
        );
        assert_eq!(
            ctx.analyze(&frame()).unwrap(),
            vec!["Prohibited objects: cell phone, book".to_string()]
        );
    }

    #[test]
    fn threshold_is_strict() {
        // Exactly 0.5 is excluded even for an allowlisted class.
        let ctx = context_with(
            StubObjectDetector::with_script(vec![vec![detection(68, 0.5)]]),
            StubFaceDetector::new(),
        );
        assert!(ctx.analyze(&frame()).unwrap().is_empty());
    }

    #[test]
    fn non_prohibited_classes_never_alert() {
        // A person at high confidence is fine.
        let ctx = context_with(
            StubObjectDetector::with_script(vec![vec![detection(1, 0.99)]]),
            StubFaceDetector::new(),
        );
        assert!(ctx.analyze(&frame()).unwrap().is_empty());
    }

    #[test]
    fn face_count_rules() {
        let ctx = context_with(
            StubObjectDetector::new(),
            StubFaceDetector::with_counts(vec![0, 2]),
        );
        assert_eq!(
            ctx.analyze(&frame()).unwrap(),
            vec![NO_FACE_ALERT.to_string()]
        );
        assert_eq!(
            ctx.analyze(&frame()).unwrap(),
            vec![MULTIPLE_FACES_ALERT.to_string()]
        );
    }

    #[test]
    fn object_alert_precedes_face_alert() {
        let ctx = context_with(
            StubObjectDetector::with_script(vec![vec![detection(64, 0.8)]]),
            StubFaceDetector::with_counts(vec![0]),
        );
        assert_eq!(
            ctx.analyze(&frame()).unwrap(),
            vec![
                "Prohibited objects: laptop".to_string(),
                NO_FACE_ALERT.to_string()
            ]
        );
    }
}
