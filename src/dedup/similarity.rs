//! Similarity scoring between two articles.
//!
//! Two signals, both pure functions over the pair being compared:
//! - title similarity: normalized edit-distance ratio over canonicalized
//!   titles (strsim).
//! - content similarity: TF-IDF cosine, with the vectorizer fitted on exactly
//!   the two documents. Per-pair fitting trades corpus-wide term rarity for a
//!   comparison that needs no global state and no recomputation when new
//!   articles arrive; there is deliberately no shared vectorizer across calls.

use std::collections::{BTreeSet, HashMap};

use super::normalize::normalize;

/// Bodies that normalize to fewer characters than this carry too little
/// signal for TF-IDF; the score degrades to 0.0 instead of erroring.
const MIN_CONTENT_CHARS: usize = 10;

/// Vocabulary cap for the pairwise vectorizer.
const MAX_TERMS: usize = 5000;

/// English stopwords excluded from content vectors. Titles are compared by
/// edit distance and are not filtered.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "if", "in", "into", "is", "it", "its", "just", "more", "most", "no",
    "not", "now", "of", "on", "one", "only", "or", "other", "our", "out", "over", "said", "she",
    "so", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "under", "up", "was", "we", "were", "what", "when", "which", "who", "will",
    "with", "would", "you",
];

/// Similarity between two titles in `[0, 1]`.
///
/// Returns 0.0 if either title normalizes to the empty string (two empty
/// titles are not evidence of duplication).
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&na, &nb)
}

/// TF-IDF cosine similarity between two article bodies in `[0, 1]`.
///
/// Returns 0.0 when either body normalizes below [`MIN_CONTENT_CHARS`] or
/// when a vector degenerates (no surviving terms after stopword removal).
pub fn content_similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.chars().count() < MIN_CONTENT_CHARS || nb.chars().count() < MIN_CONTENT_CHARS {
        return 0.0;
    }

    let terms_a = extract_terms(&na);
    let terms_b = extract_terms(&nb);

    // Vocabulary over the pair only, sorted for a deterministic cap.
    let vocab: Vec<&str> = terms_a
        .iter()
        .chain(terms_b.iter())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_TERMS)
        .collect();
    if vocab.is_empty() {
        return 0.0;
    }
    let index: HashMap<&str, usize> = vocab.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let va = vectorize(&terms_a, &index, &terms_b);
    let vb = vectorize(&terms_b, &index, &terms_a);

    cosine(&va, &vb)
}

/// Unigrams plus adjacent bigrams over stopword-filtered tokens.
fn extract_terms(normalized: &str) -> Vec<String> {
    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|t| !STOPWORDS.contains(t))
        .collect();

    let mut terms: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}

/// L2-normalized TF-IDF vector for `doc`, with smoothed idf computed over the
/// two-document corpus (`doc` and `other`).
fn vectorize(doc: &[String], index: &HashMap<&str, usize>, other: &[String]) -> Vec<f64> {
    let mut vector = vec![0.0; index.len()];
    for term in doc {
        if let Some(&i) = index.get(term.as_str()) {
            vector[i] += 1.0;
        }
    }

    // Smoothed idf over n = 2 documents: ln((n + 1) / (df + 1)) + 1.
    let other_terms: BTreeSet<&str> = other.iter().map(String::as_str).collect();
    for (term, &i) in index {
        if vector[i] == 0.0 {
            continue;
        }
        let df: f64 = if other_terms.contains(*term) { 2.0 } else { 1.0 };
        vector[i] *= (3.0 / (df + 1.0)).ln() + 1.0;
    }

    let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 || !dot.is_finite() {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_titles() {
        assert_eq!(title_similarity("Fed raises rates", "Fed raises rates"), 1.0);
    }

    #[test]
    fn test_title_case_and_punctuation_ignored() {
        assert_eq!(
            title_similarity("Fed Raises Rates!", "fed raises rates"),
            1.0
        );
    }

    #[test]
    fn test_near_identical_titles_score_high() {
        // One trailing character of difference over ~30.
        let sim = title_similarity(
            "Apple beats earnings estimates",
            "Apple beats earnings estimate",
        );
        assert!(sim >= 0.9, "expected >= 0.9, got {sim}");
    }

    #[test]
    fn test_unrelated_titles_score_low() {
        let sim = title_similarity("Fed raises rates", "Tesla recalls vehicles");
        assert!(sim < 0.5, "expected < 0.5, got {sim}");
    }

    #[test]
    fn test_empty_title_scores_zero() {
        assert_eq!(title_similarity("", "Fed raises rates"), 0.0);
        assert_eq!(title_similarity("Fed raises rates", ""), 0.0);
        assert_eq!(title_similarity("", ""), 0.0);
        // Normalizes to empty even though the input is non-empty.
        assert_eq!(title_similarity("123!", "123!"), 0.0);
    }

    #[test]
    fn test_identical_content_scores_one() {
        let text = "The central bank raised interest rates by a quarter point \
                    citing persistent inflation across the services sector";
        let sim = content_similarity(text, text);
        assert!((sim - 1.0).abs() < 1e-9, "expected 1.0, got {sim}");
    }

    #[test]
    fn test_disjoint_content_scores_zero() {
        let a = "quarterly revenue climbed sharply driven by cloud growth";
        let b = "vehicle deliveries slipped amid factory retooling downtime";
        let sim = content_similarity(a, b);
        assert!(sim < 1e-9, "expected ~0.0, got {sim}");
    }

    #[test]
    fn test_short_content_scores_zero() {
        assert_eq!(content_similarity("too short", "also tiny"), 0.0);
        assert_eq!(content_similarity("", ""), 0.0);
    }

    #[test]
    fn test_similar_content_scores_between() {
        let a = "apple reported record quarterly earnings beating analyst \
                 estimates on strong iphone demand in emerging markets";
        let b = "apple reported record quarterly earnings beating analyst \
                 estimates on weak ipad demand in european markets";
        let sim = content_similarity(a, b);
        assert!(sim > 0.5 && sim < 1.0, "expected mid-range, got {sim}");
    }

    #[test]
    fn test_content_similarity_is_symmetric() {
        let a = "markets rallied after the inflation report showed cooling prices";
        let b = "stocks climbed when the inflation data indicated cooling prices";
        let ab = content_similarity(a, b);
        let ba = content_similarity(b, a);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_stopwords_do_not_dominate() {
        // Overlap only in stopwords: no shared signal terms.
        let a = "the and of to in aaaa bbbb cccc dddd eeee";
        let b = "the and of to in vvvv wwww xxxx yyyy zzzz";
        let sim = content_similarity(a, b);
        assert!(sim < 1e-9, "expected ~0.0, got {sim}");
    }
}
