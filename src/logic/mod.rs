//! Logic Module - Business Logic & Engines
//!
//! ## Architecture
//! - `features/` - Feature schema, employee record, attribute normalizer
//! - `model/` - Trained pipeline capability, artifact loading, inference
//! - `explain/` - Tree attribution and human-readable factor naming
//! - `narrative/` - Retention narrative prompt + generator client

pub mod error;
pub mod config;
pub mod analysis;

pub mod features;
pub mod model;
pub mod explain;
pub mod narrative;
