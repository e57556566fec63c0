//! Orchestration: frame pipeline and trajectory bookkeeping.

mod pipeline;
mod trajectory;

pub use pipeline::{FusionPipeline, PipelineConfig, PipelineError};
pub use trajectory::Trajectory;
