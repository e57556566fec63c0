//! Estimated camera trajectory with optional ground-truth comparison.

use crate::core::types::Pose3D;

/// Append-only log of per-frame camera-to-world poses.
///
/// Ground truth, when the sensor provides it, is rebased into the estimate's
/// coordinate frame on insertion: the estimate anchors frame 0 at identity,
/// so the comparable ground-truth pose for frame `k` is `gt₀⁻¹ · gtₖ`.
/// Frames without ground truth break error reporting for the whole run, so
/// truth is kept only while every frame so far has provided it.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    estimates: Vec<Pose3D>,
    truth: Option<TruthTrack>,
}

#[derive(Debug, Clone)]
struct TruthTrack {
    anchor_inverse: Pose3D,
    rebased: Vec<Pose3D>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame's estimated pose and, if available, its
    /// ground-truth pose in the sensor's own frame.
    pub fn push(&mut self, estimate: Pose3D, ground_truth: Option<Pose3D>) {
        let first = self.estimates.is_empty();
        self.estimates.push(estimate);

        match (ground_truth, first) {
            (Some(gt), true) => {
                self.truth = Some(TruthTrack {
                    anchor_inverse: gt.inverse(),
                    rebased: vec![Pose3D::identity()],
                });
            }
            (Some(gt), false) => {
                if let Some(track) = self.truth.as_mut() {
                    track.rebased.push(track.anchor_inverse.compose(&gt));
                }
            }
            (None, _) => self.truth = None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Latest estimated pose, identity before any frame is recorded.
    pub fn current_pose(&self) -> Pose3D {
        self.estimates.last().copied().unwrap_or_else(Pose3D::identity)
    }

    pub fn estimates(&self) -> &[Pose3D] {
        &self.estimates
    }

    /// Rebased ground-truth poses, `None` unless every recorded frame
    /// carried ground truth.
    pub fn ground_truth(&self) -> Option<&[Pose3D]> {
        self.truth.as_ref().map(|t| t.rebased.as_slice())
    }

    /// Per-frame translational error against rebased ground truth.
    pub fn translational_errors(&self) -> Option<Vec<f32>> {
        let truth = self.ground_truth()?;
        Some(
            self.estimates
                .iter()
                .zip(truth.iter())
                .map(|(e, g)| e.translation_distance(g))
                .collect(),
        )
    }

    /// Root-mean-square translational error over the whole run.
    pub fn rms_translational_error(&self) -> Option<f32> {
        let errors = self.translational_errors()?;
        if errors.is_empty() {
            return None;
        }
        let sum: f32 = errors.iter().map(|e| e * e).sum();
        Some((sum / errors.len() as f32).sqrt())
    }
}
