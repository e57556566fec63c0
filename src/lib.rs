//! drishti-fusion - Dense RGB-D SLAM with volumetric TSDF fusion.
//!
//! Reconstructs a 3D surface model incrementally from a stream of depth
//! (and optionally color) frames while estimating the sensor pose at each
//! frame. Tracking is frame-to-model: every new frame registers against a
//! raycast rendering of the accumulated volume rather than the previous raw
//! frame, which keeps drift from compounding.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │            (pipeline, trajectory)                   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │            (registration, fusion)                   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   sensors/                          │  ← Sensor processing
//! │        (sensor trait, surface measurement)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Per-frame data flow
//!
//! ```text
//! depth ──► GeometryFrame (live) ──► ICP vs predicted frame ──► pose
//!                                                                │
//!                 ┌──────────────────────────────────────────────┘
//!                 ▼
//!        integrate depth into TSDF volume at pose
//!                 │
//!                 ▼
//!        raycast predicted frame for the next cycle
//! ```
//!
//! While the current frame is being tracked, a worker thread prepares the
//! next frame's geometry behind a mutex-guarded buffer; the worker is joined
//! before the next cycle reads it.

// Layer 1: Core foundation (no internal deps)
pub mod core;

// Layer 2: Sensor processing (depends on core)
pub mod sensors;

// Layer 3: Algorithms (depends on core, sensors)
pub mod algorithms;

// Layer 4: Orchestration (depends on all lower layers)
pub mod engine;

// Cross-cutting utilities
pub mod utils;
