use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mrr_forecast::api::{SimulateArgs, run_cli_simulation, run_http_server};
use mrr_forecast::config::{LogLevel, ServerArgs, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "mrr_forecast",
    version,
    about = "Monte Carlo MRR forecaster (growth, churn, expansion, seasonality)"
)]
struct Cli {
    #[arg(long, global = true, env = "FORECAST_LOG_LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve(ServerArgs),
    /// Run one simulation and print the JSON result
    Simulate(SimulateArgs),
}

fn init_tracing(log_level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.as_filter_str())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = match cli.log_level.parse::<LogLevel>() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    init_tracing(log_level);

    match cli.command {
        Command::Serve(args) => {
            let config = match ServerConfig::try_from(args) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "invalid configuration");
                    std::process::exit(2);
                }
            };
            tracing::info!(
                addr = %config.socket_addr(),
                max_iterations = config.simulation.max_iterations,
                timeout_secs = config.simulation.request_timeout.as_secs(),
                execution = ?config.simulation.execution,
                "configuration loaded"
            );
            if let Err(e) = run_http_server(config).await {
                tracing::error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        Command::Simulate(args) => match tokio::task::spawn_blocking(move || {
            run_cli_simulation(args).map_err(|e| e.to_string())
        })
        .await
        {
            Ok(Ok(json)) => println!("{json}"),
            Ok(Err(msg)) => {
                tracing::error!(error = %msg, "simulation failed");
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!(error = %e, "simulation task failed");
                std::process::exit(1);
            }
        },
    }
}
