//! Aggregate metrics and outlier scoring (spec §4.4).

use crate::models::AggMetrics;

/// `median` ignores zero values; `std` is `0` when fewer than two non-zero
/// samples remain.
pub fn compute_agg_metrics(values: &[i64], likes: &[i64], comments: &[i64]) -> AggMetrics {
    let non_zero: Vec<f64> = values.iter().copied().filter(|v| *v != 0).map(|v| v as f64).collect();

    let median_views = median(&non_zero);
    let mean_views = if non_zero.is_empty() { 0.0 } else { non_zero.iter().sum::<f64>() / non_zero.len() as f64 };
    let std_views = std_dev(&non_zero, mean_views);

    AggMetrics {
        total_reels: values.len() as i64,
        median_views,
        mean_views,
        std_views,
        total_views: values.iter().sum(),
        total_likes: likes.iter().sum(),
        total_comments: comments.iter().sum(),
    }
}

fn median(sorted_source: &[f64]) -> f64 {
    if sorted_source.is_empty() {
        return 0.0;
    }
    let mut values = sorted_source.to_vec();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `outlierScore = value / median`, rounded to 4 decimals; `0` when the
/// median is `0` (spec §4.4).
pub fn outlier_score(value: i64, median_value: f64) -> f64 {
    if median_value == 0.0 {
        return 0.0;
    }
    ((value as f64 / median_value) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_ignores_zero_values() {
        assert_eq!(median(&[0.0, 10.0, 20.0, 0.0, 30.0]), 20.0);
    }

    #[test]
    fn median_of_even_count_averages_middle_two() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), 25.0);
    }

    #[test]
    fn std_dev_is_zero_below_two_samples() {
        assert_eq!(std_dev(&[42.0], 42.0), 0.0);
        assert_eq!(std_dev(&[], 0.0), 0.0);
    }

    #[test]
    fn outlier_score_is_zero_when_median_is_zero() {
        assert_eq!(outlier_score(100, 0.0), 0.0);
    }

    #[test]
    fn outlier_score_rounds_to_four_decimals() {
        assert_eq!(outlier_score(100, 30.0), 3.3333);
    }

    #[test]
    fn compute_agg_metrics_ignores_zero_view_counts() {
        let agg = compute_agg_metrics(&[0, 100, 200, 0], &[1, 2, 3, 4], &[1, 1, 1, 1]);
        assert_eq!(agg.total_reels, 4);
        assert_eq!(agg.median_views, 150.0);
        assert_eq!(agg.total_views, 300);
        assert_eq!(agg.total_likes, 10);
    }
}
