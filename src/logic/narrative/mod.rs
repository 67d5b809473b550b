//! Narrative Module - Retention Recommendations
//!
//! Builds the prompt and calls the external generator. A generator
//! failure never fails the prediction: the text is replaced with a
//! placeholder and `generated` is false.

pub mod prompt;
pub mod client;

pub use client::{DisabledGenerator, NarrativeGenerator, ResponsesClient};
pub use prompt::{build_prompt, NarrativeRequest};

use serde::Serialize;

use crate::logic::error::NarrativeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub text: String,
    pub generated: bool,
}

/// Text shown in place of a narrative that could not be generated
pub fn placeholder(error: &NarrativeError) -> String {
    format!("(Could not generate retention suggestions: {})", error)
}

pub fn narrate(generator: &dyn NarrativeGenerator, request: &NarrativeRequest) -> Narrative {
    let start = std::time::Instant::now();

    match generator.generate(request) {
        Ok(text) => {
            log::debug!("Narrative from '{}' in {}ms", generator.name(), start.elapsed().as_millis());
            Narrative { text, generated: true }
        }
        Err(NarrativeError::NotConfigured) => Narrative {
            text: placeholder(&NarrativeError::NotConfigured),
            generated: false,
        },
        Err(e) => {
            log::warn!("Narrative generation via '{}' failed: {}", generator.name(), e);
            Narrative { text: placeholder(&e), generated: false }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGenerator(Result<String, NarrativeError>);

    impl NarrativeGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        fn generate(&self, _request: &NarrativeRequest) -> Result<String, NarrativeError> {
            self.0.clone()
        }
    }

    fn request() -> NarrativeRequest {
        NarrativeRequest { prompt: "p".into(), max_output_tokens: 10 }
    }

    #[test]
    fn test_success_passes_text_through() {
        let narrative = narrate(&FixedGenerator(Ok("- Check in weekly".into())), &request());
        assert!(narrative.generated);
        assert_eq!(narrative.text, "- Check in weekly");
    }

    #[test]
    fn test_failures_become_placeholder() {
        let failures = [
            NarrativeError::Timeout,
            NarrativeError::Network("connection refused".into()),
            NarrativeError::Status { status: 500, body: "boom".into() },
            NarrativeError::Empty,
        ];
        for error in failures {
            let narrative = narrate(&FixedGenerator(Err(error.clone())), &request());
            assert!(!narrative.generated);
            assert!(narrative.text.starts_with("(Could not generate retention suggestions: "));
            assert!(narrative.text.contains(&error.to_string()));
        }
    }

    #[test]
    fn test_disabled_generator_placeholder() {
        let narrative = narrate(&DisabledGenerator, &request());
        assert!(!narrative.generated);
        assert_eq!(
            narrative.text,
            "(Could not generate retention suggestions: narrative generator is not configured)"
        );
    }
}
