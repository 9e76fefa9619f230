use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use super::cancel::CancelToken;
use super::error::ForecastError;
use super::rng::{RandomSource, Rng, derive_seed};
use super::stats::summarize;
use super::types::{
    ExecutionMode, SEASONALITY_PERIOD_MONTHS, SimulationParameters, SimulationResult,
};

#[derive(Clone, Copy)]
struct MonthSample {
    growth: f64,
    churn: f64,
    expansion: f64,
}

/// Runs every trajectory from a single injected random stream.
///
/// Iterations consume the stream in order, so a deterministic source gives a
/// reproducible result.
pub fn run<R: RandomSource + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<SimulationResult, ForecastError> {
    validate(params)?;
    info!(
        iterations = params.iterations,
        horizon_months = params.horizon_months,
        "starting forecast run"
    );

    let mut outcomes = Vec::with_capacity(params.iterations);
    for completed in 0..params.iterations {
        if cancel.is_cancelled() {
            return Err(cancelled(completed, params.iterations));
        }
        outcomes.push(simulate_trajectory(params, rng)?);
    }

    Ok(finish(params, outcomes))
}

/// Runs every trajectory on its own stream derived from `seed`.
///
/// Iteration `i` always draws from `Rng::new(derive_seed(seed, i))`, so the
/// sequential and parallel modes yield identical outcomes.
pub fn run_seeded(
    params: &SimulationParameters,
    seed: u64,
    mode: ExecutionMode,
    cancel: &CancelToken,
) -> Result<SimulationResult, ForecastError> {
    validate(params)?;
    info!(
        iterations = params.iterations,
        horizon_months = params.horizon_months,
        seed,
        ?mode,
        "starting seeded forecast run"
    );

    let outcomes = match mode {
        ExecutionMode::Sequential => {
            let mut outcomes = Vec::with_capacity(params.iterations);
            for iteration in 0..params.iterations {
                if cancel.is_cancelled() {
                    return Err(cancelled(iteration, params.iterations));
                }
                let mut rng = Rng::new(derive_seed(seed, iteration));
                outcomes.push(simulate_trajectory(params, &mut rng)?);
            }
            outcomes
        }
        ExecutionMode::Parallel => run_parallel(params, seed, cancel)?,
    };

    Ok(finish(params, outcomes))
}

fn finish(params: &SimulationParameters, outcomes: Vec<f64>) -> SimulationResult {
    let result = summarize(params, outcomes);
    info!(
        median = result.percentile_50,
        mean = result.mean,
        std_dev = result.std_dev,
        "forecast run complete"
    );
    result
}

fn run_parallel(
    params: &SimulationParameters,
    seed: u64,
    cancel: &CancelToken,
) -> Result<Vec<f64>, ForecastError> {
    let completed = AtomicUsize::new(0);
    let mut outcomes = vec![0.0; params.iterations];

    let status = outcomes
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(iteration, slot)| {
            if cancel.is_cancelled() {
                return Err(None);
            }
            let mut rng = Rng::new(derive_seed(seed, iteration));
            *slot = simulate_trajectory(params, &mut rng).map_err(Some)?;
            completed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

    match status {
        Ok(()) => Ok(outcomes),
        Err(Some(err)) => Err(err),
        Err(None) => Err(cancelled(
            completed.load(Ordering::Relaxed),
            params.iterations,
        )),
    }
}

/// Final MRR of one trajectory over the full horizon.
///
/// MRR is clamped at zero after every month. A month whose update leaves the
/// finite range fails the trajectory instead of being clamped.
pub fn simulate_trajectory<R: RandomSource + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<f64, ForecastError> {
    let mut mrr = params.base_mrr;
    for month in 0..params.horizon_months {
        let sample = sample_month(params, rng);
        mrr = step_month(mrr, month, params.seasonality_factor, sample)
            .ok_or(ForecastError::Overflow { month: month + 1 })?;
    }
    Ok(mrr)
}

fn sample_month<R: RandomSource + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> MonthSample {
    let z_growth = rng.standard_normal();
    let z_churn = rng.standard_normal();
    let z_expansion = rng.standard_normal();

    MonthSample {
        growth: params.avg_growth_rate + z_growth * params.growth_volatility,
        churn: (params.avg_churn_rate + z_churn * params.churn_volatility).max(0.0),
        expansion: (params.avg_expansion_rate + z_expansion * params.expansion_volatility)
            .max(0.0),
    }
}

/// Next month's MRR, or `None` when the update is not finite.
fn step_month(mrr: f64, month: u32, seasonality_factor: f64, sample: MonthSample) -> Option<f64> {
    let seasonality =
        1.0 + seasonality_factor * (2.0 * PI * month as f64 / SEASONALITY_PERIOD_MONTHS).sin();

    let new_business = mrr * sample.growth * seasonality;
    let expansion_amount = mrr * sample.expansion;
    let churn_amount = mrr * sample.churn;

    let next = mrr + new_business + expansion_amount - churn_amount;
    next.is_finite().then(|| next.max(0.0))
}

pub fn validate(params: &SimulationParameters) -> Result<(), ForecastError> {
    if params.iterations == 0 {
        return Err(ForecastError::invalid("iterations must be > 0"));
    }

    if params.horizon_months == 0 {
        return Err(ForecastError::invalid("horizon months must be > 0"));
    }

    if !params.base_mrr.is_finite() || params.base_mrr < 0.0 {
        return Err(ForecastError::invalid("base MRR must be a finite value >= 0"));
    }

    for (name, value) in [
        ("avgGrowthRate", params.avg_growth_rate),
        ("growthVolatility", params.growth_volatility),
        ("avgChurnRate", params.avg_churn_rate),
        ("churnVolatility", params.churn_volatility),
        ("avgExpansionRate", params.avg_expansion_rate),
        ("expansionVolatility", params.expansion_volatility),
        ("seasonalityFactor", params.seasonality_factor),
    ] {
        if !value.is_finite() {
            return Err(ForecastError::invalid(format!("{name} must be finite")));
        }
    }

    if let Some(target) = params.target_value {
        if !target.is_finite() {
            return Err(ForecastError::invalid("targetValue must be finite"));
        }
    }

    Ok(())
}

fn cancelled(completed: usize, requested: usize) -> ForecastError {
    warn!(completed, requested, "forecast run cancelled");
    ForecastError::Cancelled {
        completed,
        requested,
    }
}
