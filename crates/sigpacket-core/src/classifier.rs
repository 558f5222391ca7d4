//! Lexical signature-page classifier
//!
//! Flags pages whose extracted text carries execution vocabulary. The pattern
//! is deliberately broad: a spurious candidate costs one discarded card in
//! review, a missed signature page costs a missing page in the packet.

use lazy_static::lazy_static;
use regex::Regex;

/// Execution-related words and phrases, matched as whole words
pub const EXECUTION_TERMS: &[&str] = &[
    "signature",
    "execution",
    "excecution",
    "signatory",
    "executed",
    "signed",
    "witness",
    "agreed and accepted",
    "accepted by",
    "acknowledged by",
    "duly authorized",
    "duly authorised",
];

/// Signature-block field labels, matched at a word start and ending in a colon
pub const FIELD_LABELS: &[&str] = &["By:", "Name:", "Title:", "Position:", "Date:"];

lazy_static! {
    static ref EXECUTION_PATTERN: Regex = Regex::new(
        r"(?i)\b(?:signature|ex(?:e|ce)cution|signatory|executed|signed|witness|agreed\s+and\s+accepted|accepted\s+by|acknowledged\s+by|duly\s+authori[sz]ed)\b|\b(?:by|name|title|position|date):"
    )
    .unwrap();
}

/// Returns true when the page text looks like an execution page
pub fn is_signature_candidate(text: &str) -> bool {
    EXECUTION_PATTERN.is_match(text)
}

/// Lowercased terms that triggered the match, in order of appearance
pub fn matched_terms(text: &str) -> Vec<String> {
    EXECUTION_PATTERN
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect()
}
