//! Weighted random selection primitive (spec C2).
//!
//! Callers pass integer weight vectors, never floats — precision is fixed
//! upstream (the DWM's effective-weight rounding) rather than here.

use rand::Rng;

/// Pick an index in `[0, weights.len())` with probability `weights[i] /
/// sum(weights)`. Negative weights are treated as 0. Returns `-1` if the
/// vector is empty or the weight sum is non-positive.
pub fn weighted_random_index(weights: &[i64]) -> i64 {
    if weights.is_empty() {
        return -1;
    }

    let total: i64 = weights.iter().map(|w| (*w).max(0)).sum();
    if total <= 0 {
        return -1;
    }

    let r = rand::thread_rng().gen_range(0..total);
    let mut cumulative = 0i64;
    for (i, w) in weights.iter().enumerate() {
        cumulative += (*w).max(0);
        if cumulative > r {
            return i as i64;
        }
    }

    // Unreachable given total > 0 and the loop above covers the full sum,
    // but keep a defined fallback rather than panicking on a routing path.
    -1
}
