mod adapter;
mod backend;
pub mod backends;
mod result;
pub mod yolo;

pub use adapter::{normalize, Detector};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, RawDetection};
