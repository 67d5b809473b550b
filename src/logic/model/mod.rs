//! Model Module - Trained Pipeline & Inference Engine
//!
//! Pipeline capability (`TrainedPipeline`), the JSON artifact that
//! implements it, and the engine that runs one record through it.

pub mod pipeline;
pub mod preprocess;
pub mod trees;
pub mod artifact;
pub mod inference;

// Re-export common types
pub use artifact::ArtifactPipeline;
pub use inference::{predict, EngineStatus, Inference, POSITIVE_CLASS};
pub use pipeline::{AttributionModel, TrainedPipeline};
