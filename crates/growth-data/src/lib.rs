//! Data layer for GrowthLens.
//!
//! Responsible for turning an uploaded byte stream into a normalized
//! [`Dataset`](dataset::Dataset), deriving growth/retention/cohort metrics
//! from it, and shaping the chart-ready series. Everything in this crate is
//! pure computation over in-memory data: no I/O beyond the bytes handed in
//! and no shared state.

pub mod cohort;
pub mod dataset;
pub mod loader;
pub mod metrics;
pub mod series;

pub use dataset::Dataset;
pub use loader::{LoadOutcome, Loader};
