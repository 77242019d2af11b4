//! Pipeline orchestration for GrowthLens.
//!
//! Wires the data layer and the narrative layer into one call that takes an
//! uploaded file's bytes and returns the serialized analysis report.

pub mod pipeline;
pub mod report;

pub use pipeline::{analyze, PipelineConfig};
pub use report::{AnalysisReport, ReportMetadata};
