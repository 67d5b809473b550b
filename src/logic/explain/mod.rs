//! Explain Module - Attribution Engine
//!
//! Per-feature contributions (TreeSHAP) remapped to display names,
//! plus top-factor selection.

pub mod types;
pub mod treeshap;
pub mod names;
pub mod engine;

pub use engine::{explain, explain_inference, top_factors, Attribution};
pub use names::NameMapper;
pub use types::{AttributionItem, ClassContributions, Direction, PredictionResult, ShapOutput};
