use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_KEYWORDS: usize = 10;
pub const MIN_TOKEN_LEN: usize = 3;

/// Anything that is not an ASCII word character, whitespace, or a CJK ideograph.
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s\x{4e00}-\x{9fa5}]").unwrap());

/// Function words long enough to pass the length filter but never useful as keywords.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "his", "how", "its", "who", "did", "yes", "she", "him", "this",
    "that", "with", "from", "have", "they", "will", "your", "what", "when", "were", "been",
    "than", "then", "them", "there", "their", "which", "would", "about", "into", "also",
];

/// Top `MAX_KEYWORDS` tokens by frequency; ties keep first-seen order.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    let cleaned = NON_WORD_RE.replace_all(&lowered, "");

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in cleaned.split_whitespace() {
        if token.chars().count() < MIN_TOKEN_LEN || STOPWORDS.contains(&token) {
            continue;
        }
        let count = counts.entry(token).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }

    // `order` is first-seen order and sort_by is stable
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
