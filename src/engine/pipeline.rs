//! The per-frame fusion pipeline.
//!
//! Frame-to-model tracking with one frame of lookahead: while frame `k` is
//! being tracked and integrated on the caller's thread, a background worker
//! pulls frame `k+1` from the sensor and turns it into geometry. The two
//! sides meet at a mutex-guarded single-slot buffer; the worker is joined
//! before the next frame is consumed, so at most one worker is ever alive.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::fusion::{
    PredictorConfig, ReconstructorConfig, SurfacePredictor, SurfaceReconstructor, TsdfVolume,
};
use crate::algorithms::registration::{IcpConfig, NearestNeighborIcp, PoseEstimator};
use crate::core::types::{ColorImage, DepthImage, PointCloud3D, Pose3D};
use crate::sensors::{DepthSensor, MeasurerConfig, SurfaceMeasurer};
use crate::utils::StopWatch;

use super::trajectory::Trajectory;

/// Top-level pipeline configuration, aggregating every stage's knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Voxels per volume axis. Must be even.
    pub volume_size: usize,
    /// Margin in meters added around the first frame's bounding box when
    /// calibrating the volume.
    pub volume_margin: f32,
    /// Array stride applied to the source cloud before registration.
    pub source_stride: usize,
    /// Fuse sensor color into the volume when the sensor provides it.
    pub fuse_color: bool,
    /// Distance threshold (meters) for model surface extraction.
    pub extract_distance: f32,
    /// Minimum accumulation weight for model surface extraction.
    pub extract_weight: f32,
    pub measurer: MeasurerConfig,
    pub icp: IcpConfig,
    pub reconstructor: ReconstructorConfig,
    pub predictor: PredictorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            volume_size: 128,
            volume_margin: 0.5,
            source_stride: 8,
            fuse_color: true,
            extract_distance: 0.02,
            extract_weight: 1.0,
            measurer: MeasurerConfig::default(),
            icp: IcpConfig::default(),
            reconstructor: ReconstructorConfig::default(),
            predictor: PredictorConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The sensor ended before producing a single frame.
    #[error("sensor produced no frames")]
    EmptyStream,
    /// The first frame had no valid geometry, so the volume cannot be
    /// placed over the scene.
    #[error("first frame has no valid geometry to calibrate the volume")]
    CalibrationFailed,
    /// The background frame-preparation thread panicked.
    #[error("frame preparation worker failed")]
    WorkerFailed,
}

/// Output of the background worker: one sensor frame turned into geometry,
/// together with the raw buffers needed later for integration.
struct PreparedFrame {
    geometry: crate::core::types::GeometryFrame,
    depth: DepthImage,
    color: Option<ColorImage>,
    ground_truth: Option<Pose3D>,
}

/// Dense frame-to-model SLAM over a depth sensor stream.
///
/// Construction consumes the first frame: it calibrates the volume,
/// integrates the frame at the identity pose and starts preparing the
/// second frame in the background. Each subsequent
/// [`FusionPipeline::process_next_frame`] call tracks and fuses one frame.
pub struct FusionPipeline<S: DepthSensor + Send + 'static> {
    sensor: Arc<Mutex<S>>,
    buffer: Arc<Mutex<Option<PreparedFrame>>>,
    worker: Option<JoinHandle<bool>>,
    measurer: SurfaceMeasurer,
    estimator: Box<dyn PoseEstimator + Send>,
    reconstructor: SurfaceReconstructor,
    predictor: SurfacePredictor,
    volume: TsdfVolume,
    trajectory: Trajectory,
    width: usize,
    height: usize,
    config: PipelineConfig,
}

impl<S: DepthSensor + Send + 'static> FusionPipeline<S> {
    /// Bootstrap the pipeline from the sensor's first frame.
    pub fn new(mut sensor: S, config: PipelineConfig) -> Result<Self, PipelineError> {
        if !sensor.advance_frame() {
            return Err(PipelineError::EmptyStream);
        }
        let intrinsics = sensor.intrinsics();
        let width = sensor.width();
        let height = sensor.height();
        let measurer = SurfaceMeasurer::new(intrinsics, width, height, config.measurer.clone());

        let geometry = measurer.measure(sensor.depth());
        let cloud = geometry.prune();
        // Initial voxel size is a placeholder; calibration rescales it.
        let mut volume = if config.fuse_color {
            TsdfVolume::with_color(config.volume_size, 1.0)
        } else {
            TsdfVolume::new(config.volume_size, 1.0)
        };
        if !volume.calibrate(&cloud, config.volume_margin) {
            return Err(PipelineError::CalibrationFailed);
        }
        info!(
            "volume calibrated: {} voxels/axis, {:.3} m/voxel, origin {:?}",
            volume.size(),
            volume.voxel_size(),
            volume.origin()
        );

        let reconstructor = SurfaceReconstructor::new(intrinsics, config.reconstructor.clone());
        let predictor = SurfacePredictor::new(intrinsics, config.predictor.clone());
        let estimator: Box<dyn PoseEstimator + Send> =
            Box::new(NearestNeighborIcp::new(config.icp.clone()));

        let depth = sensor.depth().clone();
        let color = if config.fuse_color {
            sensor.color().cloned()
        } else {
            None
        };
        reconstructor.integrate(&mut volume, &depth, color.as_ref(), &Pose3D::identity());

        let mut trajectory = Trajectory::new();
        trajectory.push(Pose3D::identity(), sensor.ground_truth_pose());

        let mut pipeline = Self {
            sensor: Arc::new(Mutex::new(sensor)),
            buffer: Arc::new(Mutex::new(None)),
            worker: None,
            measurer,
            estimator,
            reconstructor,
            predictor,
            volume,
            trajectory,
            width,
            height,
            config,
        };
        pipeline.spawn_preparer();
        Ok(pipeline)
    }

    /// Track and integrate the next frame.
    ///
    /// Returns `Ok(false)` when the sensor stream has ended; the model and
    /// trajectory then hold the final state.
    pub fn process_next_frame(&mut self) -> Result<bool, PipelineError> {
        let Some(worker) = self.worker.take() else {
            return Ok(false);
        };
        let loaded = worker.join().map_err(|_| PipelineError::WorkerFailed)?;
        if !loaded {
            return Ok(false);
        }
        let prepared = self
            .buffer
            .lock()
            .unwrap()
            .take()
            .ok_or(PipelineError::WorkerFailed)?;

        // Overlap the next frame's preparation with this frame's tracking
        // and integration.
        self.spawn_preparer();

        let mut watch = StopWatch::start();
        let previous_pose = self.trajectory.current_pose();
        let target = self
            .predictor
            .predict(&self.volume, self.width, self.height, &previous_pose)
            .prune();
        watch.lap("predict");

        let source = prepared.geometry.prune().stride(self.config.source_stride);
        let pose = if target.is_empty() {
            warn!("predicted surface is empty; reusing previous pose");
            previous_pose
        } else {
            self.estimator.estimate_pose(&source, &target, &previous_pose)
        };
        watch.lap("track");

        self.trajectory.push(pose, prepared.ground_truth);

        let color = if self.config.fuse_color {
            prepared.color.as_ref()
        } else {
            None
        };
        self.reconstructor
            .integrate(&mut self.volume, &prepared.depth, color, &pose);
        watch.lap("integrate");

        info!(
            "frame {}: t = {:?} ({:.1} ms)",
            self.trajectory.len() - 1,
            pose.translation(),
            watch.total().as_secs_f64() * 1e3
        );
        Ok(true)
    }

    /// Start the background worker that prepares the next sensor frame.
    fn spawn_preparer(&mut self) {
        let sensor = Arc::clone(&self.sensor);
        let buffer = Arc::clone(&self.buffer);
        let measurer = self.measurer.clone();
        self.worker = Some(thread::spawn(move || {
            let mut sensor = sensor.lock().unwrap();
            if !sensor.advance_frame() {
                return false;
            }
            let depth = sensor.depth().clone();
            let color = sensor.color().cloned();
            let ground_truth = sensor.ground_truth_pose();
            drop(sensor);

            let geometry = measurer.measure(&depth);
            *buffer.lock().unwrap() = Some(PreparedFrame {
                geometry,
                depth,
                color,
                ground_truth,
            });
            true
        }));
    }

    /// Extract the fused model surface as a point cloud.
    pub fn extract_model(&self) -> PointCloud3D {
        self.volume
            .extract_points(self.config.extract_distance, self.config.extract_weight)
    }

    /// Render the fused color model from the latest estimated pose.
    pub fn render_color(&self) -> ColorImage {
        self.predictor.predict_color(
            &self.volume,
            self.width,
            self.height,
            &self.trajectory.current_pose(),
        )
    }

    pub fn volume(&self) -> &TsdfVolume {
        &self.volume
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn current_pose(&self) -> Pose3D {
        self.trajectory.current_pose()
    }
}

impl<S: DepthSensor + Send + 'static> Drop for FusionPipeline<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
