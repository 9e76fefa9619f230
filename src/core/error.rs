use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Forecast overflowed f64 in month {month}; reduce the horizon or rates")]
    Overflow { month: u32 },

    #[error("Simulation cancelled after {completed} of {requested} iterations")]
    Cancelled { completed: usize, requested: usize },
}

impl ForecastError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ForecastError::InvalidParameters(msg.into())
    }
}
