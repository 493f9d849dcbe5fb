//! Small numeric helpers with guarded division.

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}

/// Percentage change of `a` relative to `b`; 0 when `b` is 0.
pub fn pct_diff(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    (a - b) / b * 100.0
}

/// -1, 0 or +1. NaN maps to 0.
pub fn direction(change: f64) -> i8 {
    if change > 0.0 {
        1
    } else if change < 0.0 {
        -1
    } else {
        0
    }
}

/// Round a price to the nearest multiple of `step`.
pub fn nearest_strike(price: f64, step: i64) -> i64 {
    assert!(step > 0, "strike step must be > 0");
    ((price / step as f64).round() as i64) * step
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}
