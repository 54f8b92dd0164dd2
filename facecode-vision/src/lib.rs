pub mod face;
pub mod frames;
pub mod model;
pub mod pipeline;
pub mod yunet;

// Re-export commonly used types
pub use face::Detection;
pub use frames::FrameFile;
pub use pipeline::{FrameDetections, Pipeline};
