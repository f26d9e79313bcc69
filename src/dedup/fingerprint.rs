//! Content fingerprints for exact-duplicate detection independent of URL.

use sha2::{Digest, Sha256};

use super::normalize::normalize;

/// Derive a stable hex fingerprint from an article's title and body.
///
/// The digest is computed over `normalize(title) + " " + normalize(content)`,
/// so two articles that differ only in markup, casing, or embedded URLs hash
/// identically. No randomized seeding: the same inputs produce the same
/// fingerprint across process restarts.
pub fn fingerprint(title: &str, content: &str) -> String {
    let combined = format!("{} {}", normalize(title), normalize(content));
    hex::encode(Sha256::digest(combined.as_bytes()))
}
