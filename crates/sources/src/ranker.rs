//! Top-N selection shared by every recommender.
//!
//! Scores are ordered descending. Equal scores keep their input order (the
//! sort is stable), so callers control the tie-break by the order in which
//! they hand candidates in; all recommenders pass candidates in index order.
//! NaN scores sort after every real score.

use std::cmp::Ordering;

/// Keep the `n` best `(key, score)` pairs, best first
///
/// Returns `min(n, scored.len())` entries. Re-running on identical input
/// yields identical output.
pub fn top_n<T>(mut scored: Vec<(T, f64)>, n: usize) -> Vec<(T, f64)> {
    if n == 0 {
        return Vec::new();
    }
    scored.sort_by(|a, b| compare_desc(a.1, b.1));
    scored.truncate(n);
    scored
}

/// Descending order on scores with NaN last
pub fn compare_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
