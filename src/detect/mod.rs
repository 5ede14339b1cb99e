mod backend;
pub mod backends;
mod cascade;
pub mod classes;
mod context;
mod result;

pub use backend::{FaceDetector, ObjectDetector};
pub use cascade::{group_regions, pyramid_scales, CascadeDetector, CascadeParams, WindowClassifier};
pub use context::{DetectionPolicy, InferenceContext};
pub use result::{Detection, FaceRegion};
