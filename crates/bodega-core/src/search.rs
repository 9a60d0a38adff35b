//! # Search Suggestions
//!
//! "Did you mean" support for the list screens.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  query "Labtop"                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  case-insensitive substring filter (repository)                        │
//! │       │                                                                 │
//! │       ├── rows found ──────────────► results, no suggestions           │
//! │       │                                                                 │
//! │       ▼ zero rows                                                       │
//! │  suggestions(query, universe)                                          │
//! │       │   universe = every candidate name, unfiltered                  │
//! │       ▼                                                                 │
//! │  ratio("Laptop", "Labtop") = 2·5 / 12 = 0.83 ≥ 0.6  → ["Laptop"]       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The similarity ratio is the classic sequence-matcher metric:
//! `2·M / (|a| + |b|)` where `M` is the number of characters in the matching
//! blocks found by recursively taking the longest common block and
//! repeating on both sides of it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of suggestions offered.
pub const MAX_SUGGESTIONS: usize = 3;

/// Minimum similarity ratio for a suggestion.
pub const SUGGESTION_CUTOFF: f64 = 0.6;

// =============================================================================
// Sequence Matcher
// =============================================================================

/// Character-level sequence matcher between `a` and `b`.
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    /// Positions of every character of `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl SequenceMatcher {
    pub fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, ch) in b.iter().enumerate() {
            b2j.entry(*ch).or_default().push(j);
        }

        SequenceMatcher { a, b, b2j }
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows.
    /// Ties resolve to the earliest `i`, then the earliest `j`.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        // j2len[j] = length of the match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let prev = if j > 0 {
                        j2len.get(&(j - 1)).copied().unwrap_or(0)
                    } else {
                        0
                    };
                    let k = prev + 1;
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        (best_i, best_j, best_size)
    }

    /// Total size of all matching blocks.
    pub fn matched_chars(&self) -> usize {
        let mut matched = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }

    /// Similarity in `[0, 1]`. Two empty strings are identical (1.0).
    pub fn ratio(&self) -> f64 {
        calculate_ratio(self.matched_chars(), self.a.len() + self.b.len())
    }

    /// Upper bound on `ratio()` from character multiset intersection.
    pub fn quick_ratio(&self) -> f64 {
        let mut available: HashMap<char, isize> = HashMap::new();
        for ch in &self.b {
            *available.entry(*ch).or_default() += 1;
        }

        let mut matches = 0;
        for ch in &self.a {
            let slot = available.entry(*ch).or_default();
            if *slot > 0 {
                matches += 1;
            }
            *slot -= 1;
        }

        calculate_ratio(matches, self.a.len() + self.b.len())
    }

    /// Upper bound on `ratio()` from lengths alone.
    pub fn real_quick_ratio(&self) -> f64 {
        let (la, lb) = (self.a.len(), self.b.len());
        calculate_ratio(la.min(lb), la + lb)
    }
}

fn calculate_ratio(matches: usize, length: usize) -> f64 {
    if length == 0 {
        1.0
    } else {
        2.0 * matches as f64 / length as f64
    }
}

/// Similarity ratio between two strings.
///
/// ## Example
/// ```rust
/// use bodega_core::search::similarity;
///
/// assert!(similarity("Laptop", "Labtop") > 0.8);
/// assert_eq!(similarity("abc", "xyz"), 0.0);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    SequenceMatcher::new(a, b).ratio()
}

// =============================================================================
// Close Matches
// =============================================================================

/// Up to `n` candidates whose ratio to `query` is at least `cutoff`,
/// best first. Equal scores are ordered by candidate text, descending.
/// Repeated candidates are considered once.
pub fn close_matches<I, S>(query: &str, candidates: I, n: usize, cutoff: f64) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if n == 0 {
        return Vec::new();
    }

    let mut seen = std::collections::HashSet::new();
    let mut scored: Vec<(f64, String)> = Vec::new();

    for candidate in candidates {
        let candidate = candidate.as_ref();
        if !seen.insert(candidate.to_string()) {
            continue;
        }

        let matcher = SequenceMatcher::new(candidate, query);
        if matcher.real_quick_ratio() >= cutoff && matcher.quick_ratio() >= cutoff {
            let score = matcher.ratio();
            if score >= cutoff {
                scored.push((score, candidate.to_string()));
            }
        }
    }

    scored.sort_by(|x, y| y.0.total_cmp(&x.0).then_with(|| y.1.cmp(&x.1)));
    scored.truncate(n);
    scored.into_iter().map(|(_, name)| name).collect()
}

/// Suggestions for a query with no results: at most 3, ratio ≥ 0.6.
pub fn suggestions<I, S>(query: &str, universe: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    close_matches(query, universe, MAX_SUGGESTIONS, SUGGESTION_CUTOFF)
}

/// Whether a list request should compute suggestions.
///
/// Only when the query is non-empty, nothing matched, and the query was
/// not itself picked from a previous suggestion.
pub fn wants_suggestions(query: &str, result_count: usize, from_suggestion: bool) -> bool {
    !query.trim().is_empty() && result_count == 0 && !from_suggestion
}

// =============================================================================
// Search Outcome
// =============================================================================

/// Result of a list screen search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome<T> {
    pub query: String,
    pub results: Vec<T>,
    pub suggestions: Vec<String>,
}

impl<T> SearchOutcome<T> {
    pub fn new(query: impl Into<String>, results: Vec<T>) -> Self {
        SearchOutcome {
            query: query.into(),
            results,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: [&str; 3] = ["Laptop", "Mouse", "Keyboard"];

    #[test]
    fn test_ratio() {
        assert!((similarity("Laptop", "Labtop") - 10.0 / 12.0).abs() < 1e-9);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        // "abcd" vs "bcde": block "bcd" → 2·3/8
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_quick_ratios_bound_ratio() {
        for (a, b) in [("Laptop", "Labtop"), ("Mouse", "Moose"), ("Keyboard", "drabyek")] {
            let m = SequenceMatcher::new(a, b);
            assert!(m.quick_ratio() >= m.ratio());
            assert!(m.real_quick_ratio() >= m.quick_ratio());
        }
    }

    #[test]
    fn test_suggestions_for_misspelling() {
        assert_eq!(suggestions("Labtop", CATALOG), vec!["Laptop".to_string()]);
    }

    #[test]
    fn test_no_suggestions_for_unrelated_query() {
        assert!(suggestions("Zzzzz", CATALOG).is_empty());
    }

    #[test]
    fn test_close_matches_caps_and_orders() {
        let names = ["apple", "ape", "apply", "appel", "peach", "apple"];
        let found = close_matches("appel", names, 3, 0.6);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], "appel");
        // duplicates collapse
        let unique: std::collections::HashSet<_> = found.iter().collect();
        assert_eq!(unique.len(), found.len());
    }

    #[test]
    fn test_wants_suggestions() {
        assert!(wants_suggestions("lap", 0, false));
        assert!(!wants_suggestions("lap", 2, false));
        assert!(!wants_suggestions("lap", 0, true));
        assert!(!wants_suggestions("  ", 0, false));
    }
}
