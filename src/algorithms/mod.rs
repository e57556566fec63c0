//! Core algorithms: rigid registration and volumetric fusion.

pub mod fusion;
pub mod registration;
