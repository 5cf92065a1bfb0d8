//! Bisection over a monotone feasibility predicate.
//!
//! The predicate is expected to be monotone (false below some threshold,
//! true at or above it). For non-monotone predicates the result is still a
//! value the predicate accepted, just not necessarily the smallest.

use log::debug;

/// Smallest step the search will bisect down to.
pub const MIN_EPSILON: f64 = 1e-9;

/// Widest tolerance searched, in percent.
pub const MAX_TOLERANCE: f64 = 100.0;

/// Find the smallest `v` in `(lower, upper]` with `predicate(v)`, to within
/// `epsilon`.
///
/// Only midpoints are probed; `upper` itself is never tested. Returns the
/// lowest value seen to pass, or `None` if no probe passed. An `epsilon`
/// that is not a positive finite number is clamped to [`MIN_EPSILON`].
///
/// ```
/// use stocksolver::search::binary_search;
///
/// let found = binary_search(0.0, 100.0, 0.01, |v| v >= 37.5).unwrap();
/// assert!(found >= 37.5 && found - 37.5 <= 0.01);
/// assert_eq!(binary_search(0.0, 100.0, 0.01, |_| false), None);
/// ```
pub fn binary_search<F>(lower: f64, upper: f64, epsilon: f64, mut predicate: F) -> Option<f64>
where
    F: FnMut(f64) -> bool,
{
    let epsilon = if epsilon.is_finite() && epsilon > MIN_EPSILON {
        epsilon
    } else {
        MIN_EPSILON
    };
    let (mut lo, mut hi) = (lower, upper);
    let mut best = None;

    while hi - lo > epsilon {
        let mid = lo + (hi - lo) / 2.0;
        // No representable midpoint left.
        if mid <= lo || mid >= hi {
            break;
        }
        if predicate(mid) {
            debug!("probe {mid:.6}: feasible");
            hi = mid;
            best = Some(mid);
        } else {
            debug!("probe {mid:.6}: infeasible");
            lo = mid;
        }
    }
    best
}

/// [`binary_search`] over the tolerance range `[0, 100]`.
pub fn search_tolerance<F>(epsilon: f64, predicate: F) -> Option<f64>
where
    F: FnMut(f64) -> bool,
{
    binary_search(0.0, MAX_TOLERANCE, epsilon, predicate)
}
