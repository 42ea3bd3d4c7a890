use regex::Regex;

use super::{CharIndex, Finding, PiiDetector};
use crate::error::{Error, Result};

const PATTERNS: [(&str, &str); 4] = [
    (
        "EMAIL",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
    ),
    (
        "PHONE",
        r"\b(?:\+?\d{1,3}[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]?\d{4}\b",
    ),
    ("CREDIT_CARD", r"\b(?:\d[ -]*?){13,19}\b"),
    ("NATIONAL_ID", r"\b\d{3}[- ]?\d{3}[- ]?\d{3}\b"),
];

/// Always-available regex battery.
///
/// Every pattern runs on every call: the requested entity kinds are ignored, and matches of
/// different patterns are all kept even when they overlap (a card number also contains a
/// national-ID-shaped run). Deduplication is the redactor's job.
#[derive(Debug, Clone)]
pub struct RegexDetector {
    patterns: Vec<(&'static str, Regex)>,
}

impl RegexDetector {
    pub fn new() -> Result<Self> {
        let mut patterns = Vec::with_capacity(PATTERNS.len());
        for (kind, pattern) in PATTERNS {
            let regex = Regex::new(pattern).map_err(|err| {
                Error::InvalidPattern(format!("{kind}: {err}"))
            })?;
            patterns.push((kind, regex));
        }
        Ok(Self { patterns })
    }

    /// Entity kinds this battery can report, in scan order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patterns.iter().map(|(kind, _)| *kind)
    }
}

impl PiiDetector for RegexDetector {
    fn detect(&self, text: &str, _requested: &[String]) -> Vec<Finding> {
        let index = CharIndex::new(text);
        let mut findings = Vec::new();
        for (kind, regex) in &self.patterns {
            for m in regex.find_iter(text) {
                findings.push(Finding {
                    entity_kind: (*kind).to_string(),
                    start: index.char_offset(m.start()),
                    end: index.char_offset(m.end()),
                    matched_text: m.as_str().to_string(),
                });
            }
        }
        findings
    }
}
