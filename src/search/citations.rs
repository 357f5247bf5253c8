//! Citation extraction from response text

use regex::Regex;
use std::sync::OnceLock;

/// Bracketed references in first-seen order, without duplicates
///
/// Purely numeric markers such as `[3]` are footnote indices, not
/// citations, and are skipped.
pub fn extract_citations(text: &str) -> Vec<String> {
    static CITATION: OnceLock<Regex> = OnceLock::new();

    let re = CITATION.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("Invalid regex pattern"));

    let mut citations: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let citation = &caps[1];

        if citation.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if !citations.iter().any(|c| c == citation) {
            citations.push(citation.to_string());
        }
    }

    citations
}
