//! Small numeric helpers shared across the ABC stack.

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator); 0 below two values.
pub fn sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Type-7 quantile of already-sorted data.
///
/// The probability is clamped to `[0, 1]` and mapped onto the fractional
/// rank `q · (n − 1)`; values between ranks interpolate linearly. A slice
/// with no elements has no quantiles (`NaN`).
pub fn quantile_linear_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let frac = rank - below as f64;
    let base = sorted[below];
    if frac > 0.0 {
        base + frac * (sorted[below + 1] - base)
    } else {
        base
    }
}

/// [`quantile_linear_sorted`] over unsorted data (sorts a copy).
pub fn quantile_linear(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_linear_sorted(&sorted, q)
}

/// Median (sorts a copy).
pub fn median(values: &[f64]) -> f64 {
    quantile_linear(values, 0.5)
}

/// Median absolute deviation, unscaled.
pub fn mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|x| (x - m).abs()).collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_edges() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_linear_sorted(&s, 0.0), 1.0);
        assert_relative_eq!(quantile_linear_sorted(&s, 1.0), 5.0);
        assert_relative_eq!(quantile_linear_sorted(&s, 0.5), 3.0);
        assert_relative_eq!(quantile_linear_sorted(&s, 0.25), 2.0);
    }

    #[test]
    fn median_even_and_odd() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_relative_eq!(mad(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn sd_matches_hand_computation() {
        // Values 1..5: variance 2.5.
        assert_relative_eq!(sd(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2.5f64.sqrt(), epsilon = 1e-12);
    }
}
