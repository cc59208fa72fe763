// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query and document tokenization for sparse (BM25) search.
//!
//! Lowercase, unicode-aware word split, English stopword removal. The same
//! tokenizer feeds document indexing at upsert and query-term extraction, so
//! sparse scores line up on both sides.

/// English stopwords excluded from sparse vectors.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "i", "if", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or",
    "our", "she", "so", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "to", "was", "we", "were", "what", "when", "where", "which", "who", "will", "with", "you",
    "your",
];

/// Tokenize text into lowercased word terms with stopwords removed.
///
/// Splits on any non-alphanumeric boundary (unicode-aware), keeps terms of
/// two or more characters, and preserves duplicates so callers can count
/// term frequencies.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Stable 32-bit FNV-1a hash of a term.
///
/// Used to map terms to sparse vector indices reproducibly across processes
/// (the standard library hasher is randomly seeded).
pub fn term_index(term: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in term.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits() {
        let terms = tokenize("Mumbai FLOODS hit Kurla-East");
        assert_eq!(terms, vec!["mumbai", "floods", "hit", "kurla", "east"]);
    }

    #[test]
    fn removes_stopwords() {
        let terms = tokenize("the floods in the city");
        assert_eq!(terms, vec!["floods", "city"]);
    }

    #[test]
    fn keeps_duplicates_for_term_frequency() {
        let terms = tokenize("flood flood flood warning");
        assert_eq!(terms.iter().filter(|t| *t == "flood").count(), 3);
    }

    #[test]
    fn drops_single_characters() {
        let terms = tokenize("a b flood x");
        assert_eq!(terms, vec!["flood"]);
    }

    #[test]
    fn unicode_word_split() {
        let terms = tokenize("mumbaí—flødes");
        assert_eq!(terms, vec!["mumbaí", "flødes"]);
    }

    #[test]
    fn term_index_is_stable() {
        // FNV-1a is deterministic; the exact value pins the hash variant.
        assert_eq!(term_index("flood"), term_index("flood"));
        assert_ne!(term_index("flood"), term_index("floods"));
    }

    #[test]
    fn empty_input_yields_no_terms() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }
}
