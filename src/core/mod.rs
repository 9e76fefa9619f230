mod cancel;
mod engine;
mod error;
mod rng;
mod stats;
mod types;

pub use cancel::CancelToken;
pub use engine::{run, run_seeded, simulate_trajectory, validate};
pub use error::ForecastError;
pub use rng::{RandomSource, Rng, derive_seed};
pub use stats::{histogram, percentile, probability_at_or_above, risk_factors, summarize};
pub use types::{
    ExecutionMode, HISTOGRAM_BUCKETS, HistogramBucket, RiskFactor, SEASONALITY_PERIOD_MONTHS,
    SimulationParameters, SimulationResult,
};
