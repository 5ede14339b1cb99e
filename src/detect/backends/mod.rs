mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use stub::{StubFaceDetector, StubObjectDetector};
#[cfg(feature = "backend-tract")]
pub use tract::{TractObjectDetector, TractWindowClassifier};
