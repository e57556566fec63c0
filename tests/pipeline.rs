//! End-to-end pipeline tests on synthetically rendered scenes.
//!
//! A small box-like scene (back wall, floor, side wall, sphere) is rendered
//! along known camera trajectories; the pipeline's estimated trajectory is
//! then compared against the renderer's ground truth.
//!
//! Run with: `cargo test --test pipeline`

use drishti_fusion::core::math::rotation_from_angles;
use drishti_fusion::core::types::{Intrinsics, Pose3D};
use drishti_fusion::engine::{FusionPipeline, PipelineConfig};
use drishti_fusion::sensors::{Scene, Surface, SyntheticSensor};
use nalgebra::Vector3;

// ============================================================================
// Test Scene
// ============================================================================

const WIDTH: usize = 48;
const HEIGHT: usize = 48;

fn camera() -> Intrinsics {
    Intrinsics::new(48.0, 48.0, 23.5, 23.5)
}

fn box_scene() -> Scene {
    Scene::new(vec![
        Surface::plane(
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::new(0.0, 0.0, -1.0),
            [210, 210, 210],
        ),
        Surface::plane(
            Vector3::new(0.0, 0.8, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            [150, 120, 90],
        ),
        Surface::plane(
            Vector3::new(-1.2, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            [180, 190, 200],
        ),
        Surface::sphere(Vector3::new(0.2, 0.1, 1.4), 0.3, [200, 40, 40]),
    ])
}

fn sensor_along(trajectory: Vec<Pose3D>) -> SyntheticSensor {
    SyntheticSensor::new(camera(), WIDTH, HEIGHT, box_scene(), trajectory).with_max_depth(2.5)
}

// Coarse volume for test speed; extraction and truncation thresholds are
// scaled to its voxel size.
fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig {
        volume_size: 64,
        source_stride: 4,
        extract_distance: 0.1,
        extract_weight: 0.5,
        ..PipelineConfig::default()
    };
    config.reconstructor.truncation = 0.15;
    config
}

fn lateral_sweep(frames: usize, step: f32) -> Vec<Pose3D> {
    (0..frames)
        .map(|k| {
            Pose3D::from_parts(
                rotation_from_angles(0.0, 0.0, 0.0),
                Vector3::new(step * k as f32, 0.0, 0.0),
            )
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_static_camera_stays_put() {
    let sensor = sensor_along(vec![Pose3D::identity(); 3]);
    let mut pipeline = FusionPipeline::new(sensor, test_config()).unwrap();
    while pipeline.process_next_frame().unwrap() {}

    assert_eq!(pipeline.trajectory().len(), 3);
    for pose in pipeline.trajectory().estimates() {
        assert!(
            pose.translation().norm() < 0.03,
            "static camera drifted: {:?}",
            pose.translation()
        );
        assert!(pose.rotation_distance(&Pose3D::identity()) < 0.05);
    }
}

#[test]
fn test_lateral_sweep_tracks_ground_truth() {
    let sensor = sensor_along(lateral_sweep(6, 0.01));
    let mut pipeline = FusionPipeline::new(sensor, test_config()).unwrap();
    while pipeline.process_next_frame().unwrap() {}

    let trajectory = pipeline.trajectory();
    assert_eq!(trajectory.len(), 6);

    let truth = trajectory.ground_truth().expect("synthetic ground truth");
    for (estimate, gt) in trajectory.estimates().iter().zip(truth.iter()) {
        assert!(
            estimate.translation_distance(gt) < 0.06,
            "pose error too large: est {:?} vs gt {:?}",
            estimate.translation(),
            gt.translation()
        );
        assert!(estimate.rotation_distance(gt) < 0.1);
    }
    assert!(trajectory.rms_translational_error().unwrap() < 0.06);
}

#[test]
fn test_model_accumulates_scene_surfaces() {
    let sensor = sensor_along(lateral_sweep(4, 0.01));
    let mut pipeline = FusionPipeline::new(sensor, test_config()).unwrap();
    while pipeline.process_next_frame().unwrap() {}

    let model = pipeline.extract_model();
    assert!(model.len() > 50, "model too sparse: {} points", model.len());

    // Every extracted point should lie near one of the scene surfaces
    let voxel = pipeline.volume().voxel_size();
    let tolerance = 0.1 + 2.0 * voxel;
    for p in &model.points {
        let wall = (p.z - 2.0).abs();
        let floor = (p.y - 0.8).abs();
        let side = (p.x + 1.2).abs();
        let sphere = ((*p - Vector3::new(0.2, 0.1, 1.4)).norm() - 0.3).abs();
        let nearest = wall.min(floor).min(side).min(sphere);
        assert!(
            nearest < tolerance,
            "extracted point {:?} is {:.3} m from every surface",
            p,
            nearest
        );
    }
}

#[test]
fn test_stream_end_is_terminal_not_error() {
    let sensor = sensor_along(lateral_sweep(2, 0.01));
    let mut pipeline = FusionPipeline::new(sensor, test_config()).unwrap();

    assert!(pipeline.process_next_frame().unwrap());
    assert!(!pipeline.process_next_frame().unwrap());
    assert!(!pipeline.process_next_frame().unwrap());
    assert_eq!(pipeline.trajectory().len(), 2);
}

#[test]
fn test_color_render_shows_fused_scene() {
    let sensor = sensor_along(vec![Pose3D::identity(); 2]);
    let mut pipeline = FusionPipeline::new(sensor, test_config()).unwrap();
    while pipeline.process_next_frame().unwrap() {}

    let rendered = pipeline.render_color();
    // The sphere is red and fills the image center
    let center = rendered.get(WIDTH / 2, HEIGHT / 2);
    assert!(
        center[0] > 100 && center[0] > center[1],
        "center pixel not sphere-colored: {:?}",
        center
    );
}
