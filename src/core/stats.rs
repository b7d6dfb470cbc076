//! Descriptive statistics helpers.

use statrs::statistics::Statistics;

/// Arithmetic mean. Empty input yields 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Population standard deviation (divides by n). Fewer than two values yield 0.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.population_std_dev()
}

/// Standard score of `value` against a baseline. `None` when `std` is not positive.
pub fn z_score(value: f64, mean: f64, std: f64) -> Option<f64> {
    if std > 0.0 {
        Some((value - mean) / std)
    } else {
        None
    }
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
