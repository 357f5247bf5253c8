//! Tag extraction for journal entries

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maximum tags attached to one entry
pub const MAX_TAGS: usize = 5;

/// Frequency-ranked candidates considered before filtering
const CANDIDATES: usize = 10;

/// Minimum occurrences for a word or phrase to become a tag
const MIN_OCCURRENCES: usize = 2;

fn capitalized_word() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z]*\b").expect("Invalid regex pattern"))
}

fn capitalized_phrase() -> &'static Regex {
    static PHRASE: OnceLock<Regex> = OnceLock::new();
    PHRASE.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-zA-Z]* [A-Z][a-zA-Z]*\b").expect("Invalid regex pattern")
    })
}

/// Occurrence counts that remember first-seen order for tie-breaking
#[derive(Default)]
struct Counter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Counter {
    fn add(&mut self, term: &str) {
        match self.counts.get_mut(term) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(term.to_string(), 1);
                self.order.push(term.to_string());
            }
        }
    }

    /// Terms by descending count; ties keep first-seen order
    fn ranked(self) -> Vec<(String, usize)> {
        let Self { order, counts } = self;
        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|term| {
                let count = counts.get(&term).copied().unwrap_or(0);
                (term, count)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Category tags implied by the topic name
fn category_tags(topic_name: &str) -> Vec<&'static str> {
    let lower = topic_name.to_lowercase();
    let has_word = |w: &str| lower.split(|c: char| !c.is_alphanumeric()).any(|t| t == w);

    let mut tags = Vec::new();
    if lower.contains("quantum") || lower.contains("physics") {
        tags.extend(["Physics", "Technology"]);
    }
    if has_word("ai") || lower.contains("artificial intelligence") {
        tags.extend(["AI", "Technology"]);
    }
    if lower.contains("urban") || lower.contains("city") {
        tags.extend(["Urban", "Planning"]);
    }
    tags
}

/// Up to five tags for an entry about `topic_name`
///
/// Candidates are capitalised words longer than three letters and
/// two-word capitalised phrases that occur at least twice and are not part
/// of the topic name, followed by category tags derived from the name.
pub fn extract_tags(content: &str, topic_name: &str) -> Vec<String> {
    let mut counter = Counter::default();

    for word in capitalized_word().find_iter(content) {
        if word.as_str().chars().count() > 3 {
            counter.add(word.as_str());
        }
    }
    for phrase in capitalized_phrase().find_iter(content) {
        counter.add(phrase.as_str());
    }

    let name_lower = topic_name.to_lowercase();
    let mut tags: Vec<String> = counter
        .ranked()
        .into_iter()
        .take(CANDIDATES)
        .filter(|(term, count)| {
            *count >= MIN_OCCURRENCES && !name_lower.contains(&term.to_lowercase())
        })
        .map(|(term, _)| term)
        .collect();

    tags.extend(category_tags(topic_name).into_iter().map(String::from));

    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique.truncate(MAX_TAGS);
    unique
}
