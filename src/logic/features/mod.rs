//! Features Module - Input Schema & Normalization
//!
//! Schema of the 14 HR attributes, the typed employee record and the
//! normalizer that turns raw form strings into it.

pub mod layout;
pub mod record;
pub mod substitution;
pub mod normalizer;

#[cfg(test)]
pub(crate) use normalizer::tests::sample_raw;

// Re-export common types
pub use layout::{AttributeKind, LayoutInfo, ATTRIBUTE_COUNT, FEATURE_LAYOUT};
pub use normalizer::{NormalizedRecord, Normalizer, Substitution};
pub use record::{AttributeValue, EmployeeRecord, RawInput};
pub use substitution::{SubstitutionRule, SubstitutionTable};
