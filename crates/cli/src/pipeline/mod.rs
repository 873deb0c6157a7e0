//! Run-time wiring of listeners, index and feed client.

mod runner;
mod stats;

pub use runner::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
