//! proctord - exam proctoring frame-alert pipeline.
//!
//! The core of the crate is one loop: pull a webcam frame, run two frozen
//! detectors over it, turn policy violations into short alert strings,
//! stamp the first alert onto the frame, and stream the frame to a
//! browser as multipart MJPEG while an HTTP endpoint serves the most
//! recent alerts.
//!
//! # Module structure
//!
//! - `frame`: BGR frame container and colour conversions
//! - `ingest`: capture sources (synthetic, HTTP camera, V4L2 webcam)
//! - `detect`: detector seams, policy, cascade scan, stub/ONNX backends
//! - `alert`: the process-wide append-only alert log
//! - `annotate`: in-place alert banner stamping
//! - `pipeline`: the acquire -> detect -> aggregate -> stream loop
//! - `api`: HTTP surface (landing page, stream, alert query, health)
//! - `config`: file + environment configuration

pub mod alert;
pub mod annotate;
pub mod api;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;

pub use alert::{AlertLog, MULTIPLE_FACES_ALERT, NO_FACE_ALERT, PROHIBITED_PREFIX, RECENT_WINDOW};
pub use api::{ApiConfig, ApiHandle, ApiServer};
pub use config::{DetectionSettings, ProctordConfig};
pub use detect::{
    CascadeDetector, CascadeParams, DetectionPolicy, FaceDetector, InferenceContext,
    ObjectDetector, WindowClassifier,
};
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use pipeline::{Pipeline, StreamStats, STREAM_BOUNDARY};
