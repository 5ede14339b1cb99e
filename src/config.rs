//! Daemon configuration.
//!
//! Layered the usual way: defaults, then an optional JSON config file
//! (path from `PROCTOR_CONFIG`), then `PROCTOR_*` environment overrides,
//! then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::CameraConfig;

const DEFAULT_API_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_CAMERA_URL: &str = "stub://webcam";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECT_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_SCALE_FACTOR: f32 = 1.1;
const DEFAULT_MIN_NEIGHBORS: u32 = 4;
const DEFAULT_FACE_WINDOW: u32 = 24;

#[derive(Debug, Deserialize, Default)]
struct ProctordConfigFile {
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
    prohibited_classes: Option<Vec<String>>,
    scale_factor: Option<f32>,
    min_neighbors: Option<u32>,
    object_model: Option<PathBuf>,
    face_model: Option<PathBuf>,
    face_window: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProctordConfig {
    pub api_addr: String,
    pub camera: CameraConfig,
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Detector backend: "stub" or "tract".
    pub backend: String,
    /// Detections at or below this confidence are ignored.
    pub confidence_threshold: f32,
    /// Class names that trigger the prohibited-objects alert.
    pub prohibited_classes: Vec<String>,
    /// Face pyramid step.
    pub scale_factor: f32,
    /// Minimum raw hits per face cluster.
    pub min_neighbors: u32,
    /// ONNX object detection model (tract backend).
    pub object_model: Option<PathBuf>,
    /// ONNX face window classifier model (tract backend).
    pub face_model: Option<PathBuf>,
    /// Face classifier window side length.
    pub face_window: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECT_BACKEND.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            prohibited_classes: crate::detect::classes::DEFAULT_PROHIBITED_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            object_model: None,
            face_model: None,
            face_window: DEFAULT_FACE_WINDOW,
        }
    }
}

impl ProctordConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROCTOR_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load with an explicit config file path (CLI flag), falling back to
    /// defaults when none is given.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => read_config_file(path)?,
            None => ProctordConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProctordConfigFile) -> Self {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let camera = CameraConfig {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let defaults = DetectionSettings::default();
        let detection = match file.detection {
            Some(detection) => DetectionSettings {
                backend: detection.backend.unwrap_or(defaults.backend),
                confidence_threshold: detection
                    .confidence_threshold
                    .unwrap_or(defaults.confidence_threshold),
                prohibited_classes: detection
                    .prohibited_classes
                    .unwrap_or(defaults.prohibited_classes),
                scale_factor: detection.scale_factor.unwrap_or(defaults.scale_factor),
                min_neighbors: detection.min_neighbors.unwrap_or(defaults.min_neighbors),
                object_model: detection.object_model,
                face_model: detection.face_model,
                face_window: detection.face_window.unwrap_or(defaults.face_window),
            },
            None => defaults,
        };
        Self {
            api_addr,
            camera,
            detection,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PROCTOR_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("PROCTOR_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(fps) = std::env::var("PROCTOR_TARGET_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("PROCTOR_TARGET_FPS must be an integer frame rate"))?;
            self.camera.target_fps = fps;
        }
        if let Ok(backend) = std::env::var("PROCTOR_DETECT_BACKEND") {
            if !backend.trim().is_empty() {
                self.detection.backend = backend;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        let det = &self.detection;
        if !(0.0..=1.0).contains(&det.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be in [0, 1], got {}",
                det.confidence_threshold
            ));
        }
        if det.scale_factor <= 1.0 {
            return Err(anyhow!(
                "scale_factor must be > 1.0, got {}",
                det.scale_factor
            ));
        }
        if det.face_window == 0 {
            return Err(anyhow!("face_window must be non-zero"));
        }
        match det.backend.as_str() {
            "stub" => {}
            "tract" => {
                if det.object_model.is_none() || det.face_model.is_none() {
                    return Err(anyhow!(
                        "tract backend requires detection.object_model and detection.face_model"
                    ));
                }
            }
            other => {
                return Err(anyhow!(
                    "unknown detection backend '{}'; expected stub or tract",
                    other
                ));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ProctordConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
