//! Sensor interface and per-frame surface measurement.

mod measurement;
mod synthetic;

pub use measurement::{MeasurerConfig, SurfaceMeasurer};
pub use synthetic::{Scene, Surface, SyntheticSensor};

use crate::core::types::{ColorImage, DepthImage, Intrinsics, Pose3D};

/// A range sensor producing a stream of depth (and optionally color) frames.
///
/// Implementations own their frame buffers; `depth()`/`color()` expose the
/// frame most recently loaded by [`DepthSensor::advance_frame`]. Intrinsics
/// and image dimensions are constant for the session.
pub trait DepthSensor {
    /// Advance to the next frame. Returns `false` at end of stream, which
    /// is a normal termination signal, not an error.
    fn advance_frame(&mut self) -> bool;

    /// Depth buffer of the current frame.
    fn depth(&self) -> &DepthImage;

    /// Color buffer of the current frame, if the sensor provides color.
    fn color(&self) -> Option<&ColorImage> {
        None
    }

    /// Camera intrinsics.
    fn intrinsics(&self) -> Intrinsics;

    /// Image width in pixels.
    fn width(&self) -> usize;

    /// Image height in pixels.
    fn height(&self) -> usize;

    /// Ground-truth camera-to-world pose of the current frame, when the
    /// source provides one (offline evaluation only).
    fn ground_truth_pose(&self) -> Option<Pose3D> {
        None
    }
}
