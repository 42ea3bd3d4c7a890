//! PII detection: a fixed regex battery and an adapter over a pluggable entity engine.
//!
//! All offsets are half-open character (Unicode scalar) ranges into the scanned text.

mod engine;
mod patterns;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use engine::EngineDetector;
pub use patterns::RegexDetector;

/// A detected PII span within one text buffer.
///
/// Offsets are only meaningful for the exact text the detection pass ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub entity_kind: String,
    pub start: usize,
    pub end: usize,
    pub matched_text: String,
}

/// `detect(text, requested_entity_kinds) -> findings`.
pub trait PiiDetector {
    fn detect(&self, text: &str, requested: &[String]) -> Vec<Finding>;
}

/// A span reported by an external recognizer, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedSpan {
    pub entity_kind: String,
    pub start: usize,
    pub end: usize,
}

/// Named-entity recognition engine plugged in from outside this crate.
///
/// Implementations report [`crate::Error::DetectorUnavailable`] when they cannot serve a call;
/// the detector turns any error into an empty result.
pub trait EntityRecognizer: Send + Sync {
    fn analyze(
        &self,
        text: &str,
        entities: &[String],
        language: &str,
    ) -> Result<Vec<RecognizedSpan>>;
}

/// Maps byte offsets of one text to character offsets.
pub(crate) struct CharIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            starts: text.char_indices().map(|(byte, _)| byte).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.starts.len()
    }

    /// Character offset of a byte offset that sits on a char boundary (or at the end).
    pub(crate) fn char_offset(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(idx) | Err(idx) => idx,
        }
    }

    /// Text between two character offsets; `None` when the range is empty or out of bounds.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Option<&'a str> {
        if start >= end || end > self.starts.len() {
            return None;
        }
        let from = self.starts[start];
        let to = self.starts.get(end).copied().unwrap_or(self.text.len());
        self.text.get(from..to)
    }
}
