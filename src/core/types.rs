use serde::Serialize;

pub const HISTOGRAM_BUCKETS: usize = 50;
pub const SEASONALITY_PERIOD_MONTHS: f64 = 12.0;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub base_mrr: f64,
    pub iterations: usize,
    pub horizon_months: u32,
    pub avg_growth_rate: f64,
    pub growth_volatility: f64,
    pub avg_churn_rate: f64,
    pub churn_volatility: f64,
    pub avg_expansion_rate: f64,
    pub expansion_volatility: f64,
    pub seasonality_factor: f64,
    pub target_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub range_start: f64,
    pub range_end: f64,
    pub count: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub factor: &'static str,
    pub impact: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub iterations: usize,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub worst_case: f64,
    pub best_case: f64,
    pub confidence_interval_95_low: f64,
    pub confidence_interval_95_high: f64,
    /// Percentage of outcomes at or above the target, `None` without a target.
    pub probability_of_target: Option<f64>,
    /// Percentage of outcomes strictly above the starting MRR.
    pub growth_probability: f64,
    pub histogram: Vec<HistogramBucket>,
    pub risk_factors: Vec<RiskFactor>,
}
