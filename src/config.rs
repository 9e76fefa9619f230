//! Runtime configuration.
//!
//! Every setting is a clap flag with an environment fallback, so the same
//! binary can be driven from the command line or a container environment.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, ValueEnum};
use thiserror::Error;

use crate::core::ExecutionMode;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid host address: {0}")]
    InvalidHost(String),

    #[error("Invalid port number: {0}. Must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid simulation settings: {0}")]
    InvalidSimulation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliExecutionMode {
    Sequential,
    Parallel,
}

impl From<CliExecutionMode> for ExecutionMode {
    fn from(value: CliExecutionMode) -> Self {
        match value {
            CliExecutionMode::Sequential => ExecutionMode::Sequential,
            CliExecutionMode::Parallel => ExecutionMode::Parallel,
        }
    }
}

/// Flags shared by `serve` and `simulate`.
#[derive(Args, Debug, Clone)]
pub struct SimulationArgs {
    #[arg(
        long,
        env = "FORECAST_MAX_ITERATIONS",
        default_value_t = 1_000_000,
        help = "Largest iteration count a request may ask for"
    )]
    pub max_iterations: usize,
    #[arg(
        long,
        env = "FORECAST_DEFAULT_ITERATIONS",
        default_value_t = 10_000,
        help = "Iterations used when a request omits numIterations"
    )]
    pub default_iterations: usize,
    #[arg(
        long,
        env = "FORECAST_DEFAULT_HORIZON_MONTHS",
        default_value_t = 12,
        help = "Horizon used when a request omits timeHorizonMonths"
    )]
    pub default_horizon_months: u32,
    #[arg(
        long,
        env = "FORECAST_MAX_HORIZON_MONTHS",
        default_value_t = 1_200,
        help = "Longest horizon a request may ask for"
    )]
    pub max_horizon_months: u32,
    #[arg(
        long,
        env = "FORECAST_REQUEST_TIMEOUT_SECS",
        default_value_t = 30,
        help = "Deadline for a single simulation run"
    )]
    pub request_timeout_secs: u64,
    #[arg(
        long = "default-seed",
        env = "FORECAST_SEED",
        default_value_t = 42,
        help = "Seed used when a request omits seed"
    )]
    pub default_seed: u64,
    #[arg(
        long,
        value_enum,
        env = "FORECAST_EXECUTION",
        default_value_t = CliExecutionMode::Parallel
    )]
    pub execution: CliExecutionMode,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long, env = "FORECAST_HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(short, long, env = "FORECAST_PORT", default_value_t = 8080)]
    pub port: u16,
    #[command(flatten)]
    pub simulation: SimulationArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDefaults {
    pub max_iterations: usize,
    pub default_iterations: usize,
    pub default_horizon_months: u32,
    pub max_horizon_months: u32,
    pub request_timeout: Duration,
    pub seed: u64,
    pub execution: ExecutionMode,
}

impl Default for SimulationDefaults {
    fn default() -> Self {
        Self {
            max_iterations: 1_000_000,
            default_iterations: 10_000,
            default_horizon_months: 12,
            max_horizon_months: 1_200,
            request_timeout: Duration::from_secs(30),
            seed: 42,
            execution: ExecutionMode::Parallel,
        }
    }
}

impl SimulationDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSimulation(
                "--max-iterations must be > 0".to_string(),
            ));
        }
        if self.default_iterations == 0 || self.default_iterations > self.max_iterations {
            return Err(ConfigError::InvalidSimulation(
                "--default-iterations must be between 1 and --max-iterations".to_string(),
            ));
        }
        if self.default_horizon_months == 0
            || self.default_horizon_months > self.max_horizon_months
        {
            return Err(ConfigError::InvalidSimulation(
                "--default-horizon-months must be between 1 and --max-horizon-months".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidSimulation(
                "--request-timeout-secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<SimulationArgs> for SimulationDefaults {
    type Error = ConfigError;

    fn try_from(args: SimulationArgs) -> Result<Self, Self::Error> {
        let defaults = SimulationDefaults {
            max_iterations: args.max_iterations,
            default_iterations: args.default_iterations,
            default_horizon_months: args.default_horizon_months,
            max_horizon_months: args.max_horizon_months,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            seed: args.default_seed,
            execution: args.execution.into(),
        };
        defaults.validate()?;
        Ok(defaults)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub simulation: SimulationDefaults,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        let host = args
            .host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(args.host.clone()))?;
        if args.port == 0 {
            return Err(ConfigError::InvalidPort(args.port));
        }
        Ok(ServerConfig {
            host,
            port: args.port,
            simulation: args.simulation.try_into()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation_args() -> SimulationArgs {
        SimulationArgs {
            max_iterations: 1_000_000,
            default_iterations: 10_000,
            default_horizon_months: 12,
            max_horizon_months: 1_200,
            request_timeout_secs: 30,
            default_seed: 42,
            execution: CliExecutionMode::Parallel,
        }
    }

    fn server_args() -> ServerArgs {
        ServerArgs {
            host: "127.0.0.1".to_string(),
            port: 9090,
            simulation: simulation_args(),
        }
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::Error.to_string(), "error");
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn server_config_from_args() {
        let config = ServerConfig::try_from(server_args()).expect("valid config");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.simulation, SimulationDefaults::default());
    }

    #[test]
    fn rejects_port_zero() {
        let mut args = server_args();
        args.port = 0;
        assert_eq!(
            ServerConfig::try_from(args),
            Err(ConfigError::InvalidPort(0))
        );
    }

    #[test]
    fn rejects_unparseable_host() {
        let mut args = server_args();
        args.host = "not-a-host".to_string();
        assert!(matches!(
            ServerConfig::try_from(args),
            Err(ConfigError::InvalidHost(_))
        ));
    }

    #[test]
    fn rejects_default_iterations_above_cap() {
        let mut args = simulation_args();
        args.max_iterations = 100;
        args.default_iterations = 1_000;
        let err = SimulationDefaults::try_from(args).expect_err("must reject");
        assert!(err.to_string().contains("--default-iterations"));
    }

    #[test]
    fn rejects_default_horizon_above_cap() {
        let mut args = simulation_args();
        args.max_horizon_months = 24;
        args.default_horizon_months = 36;
        let err = SimulationDefaults::try_from(args).expect_err("must reject");
        assert!(err.to_string().contains("--default-horizon-months"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut args = simulation_args();
        args.request_timeout_secs = 0;
        let err = SimulationDefaults::try_from(args).expect_err("must reject");
        assert!(err.to_string().contains("--request-timeout-secs"));
    }

    #[test]
    fn sequential_execution_maps_through() {
        let mut args = simulation_args();
        args.execution = CliExecutionMode::Sequential;
        let defaults = SimulationDefaults::try_from(args).expect("valid config");
        assert_eq!(defaults.execution, ExecutionMode::Sequential);
    }
}
