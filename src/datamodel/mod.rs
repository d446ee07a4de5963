pub mod duration;
pub mod measure_datetime;
pub mod measurement;
pub mod resource;

pub use measure_datetime::MeasureDateTime;
pub use measurement::Measurement;
pub use resource::{MetricSpec, Resource, ResourceMetrics};
