//! Offset-based masking of detected spans.

use crate::detect::Finding;

/// Merges valid `[start, end)` spans into sorted, disjoint regions.
///
/// Spans with `start >= end` or `end > len` are skipped. Touching spans stay separate regions.
fn merge_spans(findings: &[Finding], len: usize) -> Vec<(usize, usize)> {
    let mut spans = findings
        .iter()
        .filter(|f| f.start < f.end && f.end <= len)
        .map(|f| (f.start, f.end))
        .collect::<Vec<_>>();
    spans.sort_unstable();

    let mut merged = Vec::<(usize, usize)>::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Replaces every character covered by `findings` with `token`.
///
/// Overlapping findings are merged first, so each character is masked once and the returned
/// count is the number of disjoint masked regions. The output has exactly as many characters
/// as `text`.
pub fn redact(text: &str, findings: &[Finding], token: char) -> (String, usize) {
    let mut chars = text.chars().collect::<Vec<_>>();
    let regions = merge_spans(findings, chars.len());
    for &(start, end) in &regions {
        chars[start..end].fill(token);
    }
    (chars.into_iter().collect(), regions.len())
}
