//! Small shared utilities.

mod stopwatch;

pub use stopwatch::StopWatch;
