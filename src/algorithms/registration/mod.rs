//! Rigid registration between point clouds.
//!
//! [`PoseEstimator`] is the strategy seam: the orchestrator only depends on
//! the trait, so alternative registration strategies (e.g. feature-based)
//! can be substituted without touching it. [`NearestNeighborIcp`] is the
//! one implementation in scope.

mod icp;

pub use icp::{IcpConfig, NearestNeighborIcp};

use crate::core::types::{PointCloud3D, Pose3D};

/// Estimates the rigid transform aligning a source cloud onto a target
/// cloud.
pub trait PoseEstimator {
    /// Refine `initial_guess` into a transform mapping `source` points into
    /// the target's frame.
    ///
    /// Both clouds must be pruned (every element valid); `target` normals
    /// are required for point-to-plane constraints.
    fn estimate_pose(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        initial_guess: &Pose3D,
    ) -> Pose3D;
}
