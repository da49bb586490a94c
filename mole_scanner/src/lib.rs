// THEORY:
// This file is the main entry point for the `mole_scanner` library crate.
// It exports the `MoleScanPipeline` and its associated data structures
// (`PipelineConfig`, `Report`, `FrameAnalysis`, etc.) as the high-level
// interface for the engine, while the building blocks (`core_modules`) stay
// available for callers that want to drive a single stage on its own, such as
// sampling a color on a touch event or scoring a region they segmented
// themselves.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{ConfigError, Result, ScanError};
