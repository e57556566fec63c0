//! Core foundation: math primitives and data types.
//!
//! No dependencies on other crate layers.

pub mod math;
pub mod types;
