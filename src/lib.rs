// THEORY:
// This file is the main entry point for the `dot_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (like an HTTP
// backend wrapping this engine).
//
// The primary goal is to export the `AnalysisPipeline` and its associated
// data structures (`PipelineConfig`, `AnalysisResult`, the capability and
// strategy seams) as the clean, high-level interface for the entire
// analysis engine. The internal modules (`core_modules`) stay reachable
// for consumers that want individual stages, but the pipeline is the
// intended front door.

pub mod core_modules;
pub mod error;
pub mod pipeline;

// Re-export key data structures for the public API.
pub use core_modules::capability::{CapabilityStatus, MaskGenerator};
pub use core_modules::deduplicator::OverlapStrategy;
pub use core_modules::mask::{MaskGrid, RawMask};
pub use core_modules::morphology::{MorphologyReport, ObjectMeasurement};
pub use core_modules::visualizer::ArtifactSet;
pub use error::AnalysisError;
pub use pipeline::{AnalysisPipeline, AnalysisResult, PipelineConfig};
