//! Frame Alert Pipeline.
//!
//! The acquire -> detect -> aggregate -> stream loop: pull a frame from
//! the capture source, run both detectors, append alerts to the shared
//! log, stamp the first alert onto the frame, JPEG-encode it, and write
//! one multipart chunk to the consumer.
//!
//! One logical worker drives everything sequentially, one frame at a
//! time; the consumer paces the stream through blocking sink writes.
//!
//! Failure policy: an acquisition failure ends the loop permanently (no
//! retry, no reconnect). A detection or encoding failure only skips that
//! frame; the loop keeps streaming. A sink write failure means the
//! consumer went away and ends the loop quietly.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::alert::AlertLog;
use crate::annotate;
use crate::detect::InferenceContext;
use crate::frame::Frame;
use crate::ingest::CameraSource;

/// Multipart boundary token for the encoded-frame stream.
pub const STREAM_BOUNDARY: &str = "frame";

/// Counters for one finished stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamStats {
    /// Parts written to the consumer.
    pub frames_streamed: u64,
    /// Frames dropped by the per-frame error boundary.
    pub frames_skipped: u64,
    /// Alerts appended to the log.
    pub alerts_emitted: u64,
}

/// The pipeline: frozen models plus the shared alert log.
///
/// Cheap to clone per stream; the context and log are shared.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<InferenceContext>,
    log: Arc<AlertLog>,
}

impl Pipeline {
    pub fn new(ctx: Arc<InferenceContext>, log: Arc<AlertLog>) -> Self {
        Self { ctx, log }
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.log
    }

    /// Run both detectors on one frame and return its alerts.
    ///
    /// Pure with respect to the alert log and the frame; annotation is
    /// the caller's job.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<String>> {
        self.ctx.analyze(frame)
    }

    /// Drive the stream until acquisition fails, the consumer disconnects,
    /// or `shutdown` is raised. The source is owned by this stream and
    /// released when it ends, on every exit path.
    pub fn run<W: Write>(
        &self,
        source: &mut CameraSource,
        sink: &mut W,
        shutdown: &AtomicBool,
    ) -> Result<StreamStats> {
        let mut stats = StreamStats::default();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("stream stopping: shutdown requested");
                break;
            }

            let mut frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    // Acquisition failure ends the stream permanently.
                    log::info!("stream ended: {:#}", err);
                    break;
                }
            };

            let alerts = match self.detect(&frame) {
                Ok(alerts) => alerts,
                Err(err) => {
                    log::warn!("detection failed, skipping frame: {:#}", err);
                    stats.frames_skipped += 1;
                    continue;
                }
            };

            if !alerts.is_empty() {
                self.log.append(&alerts);
                stats.alerts_emitted += alerts.len() as u64;
                annotate::draw_alert_banner(&mut frame, &alerts[0]);
            }

            let jpeg = match frame.encode_jpeg() {
                Ok(jpeg) => jpeg,
                Err(err) => {
                    log::warn!("jpeg encode failed, skipping frame: {:#}", err);
                    stats.frames_skipped += 1;
                    continue;
                }
            };

            if let Err(err) = write_part(sink, &jpeg) {
                log::debug!("stream consumer disconnected: {}", err);
                break;
            }
            stats.frames_streamed += 1;
        }

        Ok(stats)
    }
}

/// Write one multipart chunk: boundary line, part header, JPEG payload.
pub fn write_part<W: Write>(sink: &mut W, jpeg: &[u8]) -> std::io::Result<()> {
    sink.write_all(b"--")?;
    sink.write_all(STREAM_BOUNDARY.as_bytes())?;
    sink.write_all(b"\r\nContent-Type: image/jpeg\r\n\r\n")?;
    sink.write_all(jpeg)?;
    sink.write_all(b"\r\n")?;
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{StubFaceDetector, StubObjectDetector};
    use crate::detect::{DetectionPolicy, InferenceContext};
    use crate::ingest::{CameraConfig, CameraSource};

    fn pipeline(object: StubObjectDetector, face: StubFaceDetector) -> Pipeline {
        let ctx = InferenceContext::new(
            Box::new(object),
            Box::new(face),
            DetectionPolicy::default(),
        );
        Pipeline::new(Arc::new(ctx), Arc::new(AlertLog::new()))
    }

    fn bounded_source(frames: u32) -> CameraSource {
        let mut source = CameraSource::new(CameraConfig {
            url: format!("stub://test?frames={}", frames),
            target_fps: 0,
            width: 64,
            height: 48,
        })
        .unwrap();
        source.connect().unwrap();
        source
    }

    #[test]
    fn stream_ends_on_acquisition_failure() {
        let pipeline = pipeline(StubObjectDetector::new(), StubFaceDetector::new());
        let mut source = bounded_source(3);
        let mut sink = Vec::new();
        let shutdown = AtomicBool::new(false);

        let stats = pipeline.run(&mut source, &mut sink, &shutdown).unwrap();
        assert_eq!(stats.frames_streamed, 3);
        assert_eq!(stats.frames_skipped, 0);
        // Silent frames (one face, no objects): no alerts logged.
        assert!(pipeline.alert_log().is_empty());
    }

    #[test]
    fn alerts_are_appended_in_capture_order() {
        let pipeline = pipeline(
            StubObjectDetector::new(),
            StubFaceDetector::with_counts(vec![0, 1, 2]),
        );
        let mut source = bounded_source(3);
        let mut sink = Vec::new();
        let shutdown = AtomicBool::new(false);

        let stats = pipeline.run(&mut source, &mut sink, &shutdown).unwrap();
        assert_eq!(stats.alerts_emitted, 2);
        assert_eq!(
            pipeline.alert_log().recent(10),
            vec![
                "No face detected".to_string(),
                "Multiple faces detected".to_string()
            ]
        );
    }

    #[test]
    fn multipart_framing_matches_wire_format() {
        let mut sink = Vec::new();
        write_part(&mut sink, b"JPEGBYTES").unwrap();
        assert_eq!(
            sink,
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEGBYTES\r\n"
        );
    }

    #[test]
    fn stream_contains_one_part_per_frame() {
        let pipeline = pipeline(StubObjectDetector::new(), StubFaceDetector::new());
        let mut source = bounded_source(2);
        let mut sink = Vec::new();
        let shutdown = AtomicBool::new(false);

        pipeline.run(&mut source, &mut sink, &shutdown).unwrap();
        let needle: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        let count = sink.windows(needle.len()).filter(|w| *w == needle).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn shutdown_stops_the_stream_immediately() {
        let pipeline = pipeline(StubObjectDetector::new(), StubFaceDetector::new());
        let mut source = bounded_source(100);
        let mut sink = Vec::new();
        let shutdown = AtomicBool::new(true);

        let stats = pipeline.run(&mut source, &mut sink, &shutdown).unwrap();
        assert_eq!(stats.frames_streamed, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn detect_is_deterministic_for_identical_frames() {
        // Two scripted detectors that report the same thing twice.
        let script = || {
            StubObjectDetector::with_script(vec![
                vec![crate::detect::Detection {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 16.0,
                    y2: 16.0,
                    class_index: 68,
                    score: 0.9,
                }];
                2
            ])
        };
        let pipeline = pipeline(script(), StubFaceDetector::new());
        let frame = Frame::from_bgr(vec![7u8; 64 * 48 * 3], 64, 48).unwrap();

        let first = pipeline.detect(&frame).unwrap();
        let second = pipeline.detect(&frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["Prohibited objects: cell phone".to_string()]);
    }
}
