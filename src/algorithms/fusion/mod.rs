//! Volumetric fusion: TSDF volume, depth integration, surface prediction.

mod predictor;
mod reconstructor;
mod tsdf;

pub use predictor::{PredictorConfig, SurfacePredictor};
pub use reconstructor::{ReconstructorConfig, SurfaceReconstructor};
pub use tsdf::TsdfVolume;
