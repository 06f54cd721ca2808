//! Natural ("alphanumeric") ordering for page and archive names.
//!
//! Scanlation archives number their pages without zero padding often enough
//! that plain lexicographic order shuffles them ("10.jpg" before "2.jpg").
//! This module provides a tokenized sort key where runs of decimal digits
//! compare as numbers and everything else compares as text, restoring the
//! intended reading order.

use std::cmp::Ordering;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Splits a name into maximal digit runs and non-digit runs,
    /// e.g. "page10.jpg" -> ["page", "10", ".jpg"].
    pub static ref TOKEN_REGEX: Regex = Regex::new(r"[0-9]+|[^0-9]+").unwrap();
}

/// One tokenized run of a name. Digit runs carry their parsed value; runs too
/// long for `u128` keep `number = None` and compare as text.
#[derive(Debug, Clone)]
struct Token {
    raw: String,
    number: Option<u128>,
}

/// Ordered sort key for a file or member name.
///
/// Keys compare token-wise: two digit runs compare numerically, any other
/// pairing compares the raw token text. Numerically equal spellings
/// ("007" vs "7") and prefix names are tie-broken by the full original
/// string, so the order is total and deterministic.
#[derive(Debug, Clone)]
pub struct NaturalSortKey {
    tokens: Vec<Token>,
    raw: String,
}

impl NaturalSortKey {
    pub fn new(name: &str) -> Self {
        let tokens = TOKEN_REGEX
            .find_iter(name)
            .map(|m| {
                let raw = m.as_str().to_string();
                let number = if raw.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) {
                    raw.parse::<u128>().ok()
                } else {
                    None
                };
                Token { raw, number }
            })
            .collect();

        Self {
            tokens,
            raw: name.to_string(),
        }
    }
}

impl Ord for NaturalSortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for pair in self.tokens.iter().zip(other.tokens.iter()) {
            let ord = match (pair.0.number, pair.1.number) {
                (Some(a), Some(b)) => a.cmp(&b),
                // Mismatched token kinds (or unparseable digit runs) fall
                // back to comparing the raw text of both tokens.
                _ => pair.0.raw.cmp(&pair.1.raw),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        match self.tokens.len().cmp(&other.tokens.len()) {
            // All tokens tied: the full name keeps "007" vs "7" deterministic.
            Ordering::Equal => self.raw.cmp(&other.raw),
            ord => ord,
        }
    }
}

impl PartialOrd for NaturalSortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NaturalSortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NaturalSortKey {}

/// Compares two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    NaturalSortKey::new(a).cmp(&NaturalSortKey::new(b))
}

/// Compares two paths by their final component in natural order.
/// Paths without a final component (e.g. `/`) compare by their full text.
pub fn natural_cmp_paths(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().unwrap_or(a.as_os_str()).to_string_lossy();
    let b_name = b.file_name().unwrap_or(b.as_os_str()).to_string_lossy();
    natural_cmp(&a_name, &b_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn numeric_runs_sort_numerically() {
        let mut names = vec!["page2.jpg", "page10.jpg", "page1.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["page1.jpg", "page2.jpg", "page10.jpg"]);
    }

    #[test]
    fn mixed_padding_is_deterministic() {
        let mut names = vec!["7.jpg", "007.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        // Numerically tied; the shorter-spelled name loses on the raw
        // tie-break because '0' < '7'.
        assert_eq!(names, vec!["007.jpg", "7.jpg"]);
        assert_ne!(natural_cmp("007.jpg", "7.jpg"), Ordering::Equal);
    }

    #[test]
    fn mismatched_kinds_fall_back_to_text() {
        // '1' < 'a' in ASCII, so the digit run sorts first.
        assert_eq!(natural_cmp("123", "abc"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "123"), Ordering::Greater);
    }

    #[test]
    fn prefix_names_sort_first() {
        assert_eq!(natural_cmp("page", "page1"), Ordering::Less);
        assert_eq!(natural_cmp("ch1", "ch1x"), Ordering::Less);
    }

    #[test]
    fn oversized_digit_runs_do_not_panic() {
        let huge = "9".repeat(60);
        let other = "8".repeat(60);
        // Both overflow u128 and degrade to text comparison.
        assert_eq!(natural_cmp(&other, &huge), Ordering::Less);
        assert_eq!(natural_cmp(&huge, &huge), Ordering::Equal);
    }

    #[test]
    fn paths_compare_by_file_name_only() {
        let a = PathBuf::from("zzz/page2.cbz");
        let b = PathBuf::from("aaa/page10.cbz");
        assert_eq!(natural_cmp_paths(&a, &b), Ordering::Less);
    }

    #[test]
    fn sorting_is_stable_across_full_chapter_listing() {
        let mut names = vec![
            "ch1/12.png",
            "cover.jpg",
            "2.jpg",
            "10.jpg",
            "1.jpg",
            "03.jpg",
        ];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["1.jpg", "2.jpg", "03.jpg", "10.jpg", "ch1/12.png", "cover.jpg"]
        );
    }
}
