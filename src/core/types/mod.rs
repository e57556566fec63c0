//! Core data types shared across the pipeline.

mod geometry_frame;
mod image;
mod intrinsics;
mod pose;

pub use geometry_frame::{GeometryFrame, PointCloud3D};
pub use image::{ColorImage, DepthImage, DEPTH_SENTINEL};
pub use intrinsics::Intrinsics;
pub use pose::Pose3D;
