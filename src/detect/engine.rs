use std::sync::Arc;

use super::{CharIndex, EntityRecognizer, Finding, PiiDetector};

/// Adapter over an optional external [`EntityRecognizer`].
///
/// Detection never fails: a missing engine or an engine error degrades to "no findings" with a
/// warning, since access control never depends on detection.
#[derive(Clone, Default)]
pub struct EngineDetector {
    recognizer: Option<Arc<dyn EntityRecognizer>>,
    language: String,
}

impl std::fmt::Debug for EngineDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDetector")
            .field("registered", &self.recognizer.is_some())
            .field("language", &self.language)
            .finish()
    }
}

impl EngineDetector {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, language: impl Into<String>) -> Self {
        Self {
            recognizer: Some(recognizer),
            language: language.into(),
        }
    }

    /// No engine registered; every call yields no findings.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Same engine, different language.
    pub fn with_language(&self, language: &str) -> Self {
        Self {
            recognizer: self.recognizer.clone(),
            language: language.to_string(),
        }
    }
}

impl PiiDetector for EngineDetector {
    fn detect(&self, text: &str, requested: &[String]) -> Vec<Finding> {
        let Some(recognizer) = &self.recognizer else {
            tracing::warn!("entity engine selected but none is registered; returning no findings");
            return Vec::new();
        };
        let spans = match recognizer.analyze(text, requested, &self.language) {
            Ok(spans) => spans,
            Err(err) => {
                tracing::warn!(
                    code = err.code(),
                    error = %err,
                    "entity engine failed; returning no findings"
                );
                return Vec::new();
            }
        };

        let index = CharIndex::new(text);
        let mut findings = Vec::with_capacity(spans.len());
        for span in spans {
            let Some(matched) = index.slice(span.start, span.end) else {
                tracing::debug!(
                    kind = %span.entity_kind,
                    start = span.start,
                    end = span.end,
                    "dropping out-of-range engine span"
                );
                continue;
            };
            findings.push(Finding {
                entity_kind: span.entity_kind,
                start: span.start,
                end: span.end,
                matched_text: matched.to_string(),
            });
        }
        findings
    }
}
