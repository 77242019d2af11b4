//! Shared types for the GrowthLens analytics pipeline.
//!
//! Holds the normalized record model, period arithmetic, the metric and
//! cohort value types, the error taxonomy and the CLI settings. Everything
//! here is pure data; the pipeline stages live in `growth-data`,
//! `growth-narrative` and `growth-runtime`.

pub mod error;
pub mod field_parsers;
pub mod models;
pub mod settings;
