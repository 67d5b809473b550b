//! Attrition Core - Inference, Attribution & Retention Narrative
//!
//! Turns a raw employee attribute form into a calibrated attrition
//! probability, ranked per-feature contributions and a narrative request.
//!
//! ## Flow
//! raw form → `features::normalizer` → `model::inference` → `explain::engine`
//! → `narrative`, wired together by `logic::analysis::AttritionAnalyzer`.

pub mod constants;
pub mod logic;

pub use logic::analysis::{AttritionAnalyzer, PredictionReport};
pub use logic::error::AttritionError;
