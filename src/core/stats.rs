use super::types::{
    HISTOGRAM_BUCKETS, HistogramBucket, RiskFactor, SimulationParameters, SimulationResult,
};

// Illustrative presentation constants, not derived from the outcome distribution.
const CHURN_RISK_MULTIPLIER: f64 = 12.0;
const CHURN_RISK_PROBABILITY: f64 = 20.0;
const GROWTH_RISK_MULTIPLIER: f64 = 6.0;
const GROWTH_RISK_PROBABILITY: f64 = 30.0;
const EXPANSION_UPSIDE_MULTIPLIER: f64 = 8.0;
const EXPANSION_UPSIDE_PROBABILITY: f64 = 25.0;

/// Reduces the final MRR of every trajectory to the summary record.
///
/// `outcomes` must hold exactly one value per iteration; it is sorted in place.
pub fn summarize(params: &SimulationParameters, mut outcomes: Vec<f64>) -> SimulationResult {
    outcomes.sort_by(|a, b| a.total_cmp(b));
    let sorted = outcomes.as_slice();
    let n = sorted.len();

    let mean = mean(sorted);
    let std_dev = population_std_dev(sorted, mean);
    let worst_case = sorted.first().copied().unwrap_or(0.0);
    let best_case = sorted.last().copied().unwrap_or(0.0);

    SimulationResult {
        iterations: n,
        percentile_10: percentile(sorted, 0.10),
        percentile_25: percentile(sorted, 0.25),
        percentile_50: percentile(sorted, 0.50),
        percentile_75: percentile(sorted, 0.75),
        percentile_90: percentile(sorted, 0.90),
        mean,
        std_dev,
        worst_case,
        best_case,
        confidence_interval_95_low: percentile(sorted, 0.025),
        confidence_interval_95_high: percentile(sorted, 0.975),
        probability_of_target: params
            .target_value
            .map(|target| probability_at_or_above(sorted, target)),
        growth_probability: probability_above(sorted, params.base_mrr),
        histogram: histogram(sorted),
        risk_factors: risk_factors(params),
    }
}

/// Value at index `floor(n * p)` of an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Percentage of outcomes `>= threshold` in an ascending slice.
pub fn probability_at_or_above(sorted: &[f64], threshold: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let below = sorted.partition_point(|v| *v < threshold);
    (sorted.len() - below) as f64 / sorted.len() as f64 * 100.0
}

fn probability_above(sorted: &[f64], threshold: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let at_or_below = sorted.partition_point(|v| *v <= threshold);
    (sorted.len() - at_or_below) as f64 / sorted.len() as f64 * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Equal-width buckets spanning `[min, max]` of an ascending slice.
///
/// A zero-width range puts every outcome in the first bucket.
pub fn histogram(sorted: &[f64]) -> Vec<HistogramBucket> {
    let n = sorted.len();
    let min = sorted.first().copied().unwrap_or(0.0);
    let max = sorted.last().copied().unwrap_or(0.0);
    let width = (max - min) / HISTOGRAM_BUCKETS as f64;

    let mut counts = [0_usize; HISTOGRAM_BUCKETS];
    for &value in sorted {
        let idx = if width > 0.0 {
            (((value - min) / width).floor() as usize).min(HISTOGRAM_BUCKETS - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistogramBucket {
            range_start: min + width * i as f64,
            range_end: min + width * (i + 1) as f64,
            count,
            probability: if n == 0 {
                0.0
            } else {
                count as f64 / n as f64 * 100.0
            },
        })
        .collect()
}

pub fn risk_factors(params: &SimulationParameters) -> Vec<RiskFactor> {
    vec![
        RiskFactor {
            factor: "Churn rate increase",
            impact: -(params.churn_volatility * params.base_mrr * CHURN_RISK_MULTIPLIER),
            probability: CHURN_RISK_PROBABILITY,
        },
        RiskFactor {
            factor: "Growth slowdown",
            impact: -(params.growth_volatility * params.base_mrr * GROWTH_RISK_MULTIPLIER),
            probability: GROWTH_RISK_PROBABILITY,
        },
        RiskFactor {
            factor: "Expansion opportunity",
            impact: params.expansion_volatility * params.base_mrr * EXPANSION_UPSIDE_MULTIPLIER,
            probability: EXPANSION_UPSIDE_PROBABILITY,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn params() -> SimulationParameters {
        SimulationParameters {
            base_mrr: 100_000.0,
            iterations: 10,
            horizon_months: 12,
            avg_growth_rate: 0.05,
            growth_volatility: 0.02,
            avg_churn_rate: 0.03,
            churn_volatility: 0.01,
            avg_expansion_rate: 0.02,
            expansion_volatility: 0.005,
            seasonality_factor: 0.0,
            target_value: None,
        }
    }

    #[test]
    fn percentile_uses_floor_index() {
        let sorted: Vec<f64> = (0..10).map(f64::from).collect();
        assert_approx(percentile(&sorted, 0.10), 1.0);
        assert_approx(percentile(&sorted, 0.25), 2.0);
        assert_approx(percentile(&sorted, 0.50), 5.0);
        assert_approx(percentile(&sorted, 0.75), 7.0);
        assert_approx(percentile(&sorted, 0.90), 9.0);
        assert_approx(percentile(&sorted, 0.025), 0.0);
        assert_approx(percentile(&sorted, 0.975), 9.0);
    }

    #[test]
    fn percentile_of_single_outcome_is_that_outcome() {
        assert_approx(percentile(&[42.0], 0.975), 42.0);
        assert_approx(percentile(&[42.0], 0.0), 42.0);
    }

    #[test]
    fn summarize_reports_population_std_dev() {
        let result = summarize(&params(), vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_approx(result.mean, 5.0);
        assert_approx(result.std_dev, 2.0);
        assert_approx(result.worst_case, 2.0);
        assert_approx(result.best_case, 9.0);
        assert_eq!(result.iterations, 8);
    }

    #[test]
    fn summarize_sorts_unordered_outcomes() {
        let result = summarize(&params(), vec![9.0, 1.0, 5.0, 3.0, 7.0]);
        assert_approx(result.worst_case, 1.0);
        assert_approx(result.best_case, 9.0);
        assert_approx(result.percentile_50, 5.0);
    }

    #[test]
    fn target_probability_is_absent_without_target() {
        let result = summarize(&params(), vec![1.0, 2.0, 3.0]);
        assert_eq!(result.probability_of_target, None);
    }

    #[test]
    fn target_probability_counts_ties_as_hits() {
        let mut p = params();
        p.target_value = Some(3.0);
        let result = summarize(&p, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(result.probability_of_target, Some(50.0));
    }

    #[test]
    fn target_beyond_extremes_gives_zero_or_hundred() {
        let sorted = [10.0, 20.0, 30.0];
        assert_approx(probability_at_or_above(&sorted, 31.0), 0.0);
        assert_approx(probability_at_or_above(&sorted, 9.0), 100.0);
    }

    #[test]
    fn growth_probability_excludes_outcomes_equal_to_base() {
        let mut p = params();
        p.base_mrr = 2.0;
        let result = summarize(&p, vec![1.0, 2.0, 3.0, 4.0]);
        assert_approx(result.growth_probability, 50.0);
    }

    #[test]
    fn histogram_places_max_in_last_bucket() {
        let sorted: Vec<f64> = (0..=100).map(f64::from).collect();
        let buckets = histogram(&sorted);
        assert_eq!(buckets.len(), HISTOGRAM_BUCKETS);
        assert_eq!(buckets[HISTOGRAM_BUCKETS - 1].count, 3);
        assert_eq!(buckets[0].count, 2);
        assert_approx(buckets[0].range_start, 0.0);
        assert_approx(buckets[HISTOGRAM_BUCKETS - 1].range_end, 100.0);
    }

    #[test]
    fn zero_width_histogram_fills_first_bucket() {
        let buckets = histogram(&[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(buckets.len(), HISTOGRAM_BUCKETS);
        assert_eq!(buckets[0].count, 4);
        assert_approx(buckets[0].probability, 100.0);
        assert!(buckets[1..].iter().all(|b| b.count == 0));
    }

    #[test]
    fn risk_factors_follow_fixed_formulas() {
        let factors = risk_factors(&params());
        assert_eq!(factors.len(), 3);
        assert_eq!(factors[0].factor, "Churn rate increase");
        assert_approx(factors[0].impact, -(0.01 * 100_000.0 * 12.0));
        assert_approx(factors[0].probability, 20.0);
        assert_eq!(factors[1].factor, "Growth slowdown");
        assert_approx(factors[1].impact, -(0.02 * 100_000.0 * 6.0));
        assert_approx(factors[1].probability, 30.0);
        assert_eq!(factors[2].factor, "Expansion opportunity");
        assert_approx(factors[2].impact, 0.005 * 100_000.0 * 8.0);
        assert_approx(factors[2].probability, 25.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_histogram_counts_sum_to_outcomes(
            values in vec(0.0f64..1_000_000.0, 1..400)
        ) {
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let buckets = histogram(&sorted);
            prop_assert_eq!(buckets.len(), HISTOGRAM_BUCKETS);
            prop_assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), values.len());
            let total_probability: f64 = buckets.iter().map(|b| b.probability).sum();
            prop_assert!((total_probability - 100.0).abs() < 1e-6);
        }

        #[test]
        fn prop_target_probability_is_non_increasing(
            values in vec(0.0f64..1_000_000.0, 1..400),
            lo in 0.0f64..1_000_000.0,
            step in 0.0f64..500_000.0
        ) {
            let mut sorted = values;
            sorted.sort_by(|a, b| a.total_cmp(b));
            let low_target = probability_at_or_above(&sorted, lo);
            let high_target = probability_at_or_above(&sorted, lo + step);
            prop_assert!(high_target <= low_target);
        }

        #[test]
        fn prop_summary_is_ordered(values in vec(0.0f64..1_000_000.0, 1..400)) {
            let result = summarize(&params(), values);
            prop_assert!(result.worst_case <= result.percentile_10);
            prop_assert!(result.percentile_10 <= result.percentile_25);
            prop_assert!(result.percentile_25 <= result.percentile_50);
            prop_assert!(result.percentile_50 <= result.percentile_75);
            prop_assert!(result.percentile_75 <= result.percentile_90);
            prop_assert!(result.percentile_90 <= result.best_case);
            prop_assert!(result.confidence_interval_95_low <= result.confidence_interval_95_high);
            prop_assert!(result.worst_case <= result.mean + 1e-6);
            prop_assert!(result.mean <= result.best_case + 1e-6);
        }
    }
}
