//! Average/percentile math, a direct port of `aggregator.cpp`'s
//! `calculateAverage`/`calculateP95`.

/// Arithmetic mean, `0.0` for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// 95th percentile via nearest-rank on a sorted copy: `index = floor(0.95 *
/// (n - 1))`. `0.0` for an empty slice. Matches the source exactly,
/// including its behavior on a single-element input (returns that element).
pub fn p95(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let index = ((sorted.len() - 1) as f64 * 0.95) as usize;
    sorted[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
    }

    #[test]
    fn average_basic() {
        assert_eq!(average(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn p95_of_empty_is_zero() {
        assert_eq!(p95(&[]), 0.0);
    }

    #[test]
    fn p95_single_value_returns_that_value() {
        assert_eq!(p95(&[42.0]), 42.0);
    }

    #[test]
    fn p95_of_one_to_hundred_is_96() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        // index = floor(0.95 * 99) = 94, sorted[94] == 95.0
        assert_eq!(p95(&values), 95.0);
    }

    #[test]
    fn p95_ignores_input_order() {
        let mut values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        values.reverse();
        assert_eq!(p95(&values), p95(&(1..=20).map(|v| v as f64).collect::<Vec<_>>()));
    }
}
