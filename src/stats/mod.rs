//! Statistics for the coordinator

pub mod metrics;

pub use metrics::{CoordinatorCounters, CoordinatorStats};
