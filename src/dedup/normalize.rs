//! Text canonicalization shared by fingerprinting and similarity scoring.

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email pattern")
});

/// Canonicalize free text for comparison.
///
/// Lower-cases, strips URLs and email addresses, drops every character that
/// is not an ASCII letter or whitespace, and collapses whitespace runs to a
/// single space. Pure and total: empty input yields an empty string, and the
/// function is idempotent (`normalize(normalize(x)) == normalize(x)`).
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL_RE.replace_all(&lowered, " ");
    let without_emails = EMAIL_RE.replace_all(&without_urls, " ");

    let letters: String = without_emails
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();

    letters.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(normalize("  Fed Raises Rates  "), "fed raises rates");
    }

    #[test]
    fn test_strips_urls() {
        assert_eq!(
            normalize("Read more at https://example.com/story?id=42 today"),
            "read more at today"
        );
    }

    #[test]
    fn test_strips_emails() {
        assert_eq!(
            normalize("Contact press@example.com for details"),
            "contact for details"
        );
    }

    #[test]
    fn test_strips_digits_and_punctuation() {
        assert_eq!(
            normalize("Q3 earnings: up 14.5%, beating estimates!"),
            "q earnings up beating estimates"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("a\t\tb\n\nc   d"), "a b c d");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
        assert_eq!(normalize("123 456 !!!"), "");
    }

    #[test]
    fn test_non_ascii_letters_removed() {
        // Case folding happens before the ASCII filter, so accented
        // characters are dropped rather than kept uppercase.
        assert_eq!(normalize("Café Müller opens"), "caf mller opens");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in ".{0,200}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_output_is_ascii_letters_and_spaces(s in ".{0,200}") {
            let out = normalize(&s);
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c == ' '));
            prop_assert!(!out.starts_with(' '));
            prop_assert!(!out.ends_with(' '));
            prop_assert!(!out.contains("  "));
        }
    }
}
