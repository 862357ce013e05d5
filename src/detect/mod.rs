//! Detect module - Chart region detection on page renders

mod detector;
mod region;

pub use detector::ChartRegionDetector;
pub use region::{BoundingBox, CandidateRegion};
