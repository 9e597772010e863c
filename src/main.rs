/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

use clap::Parser;
use follower_relay::config::ConfigSource;
use follower_relay::signals::wait_for_shutdown_signal;
use follower_relay::{LogLevel, Server, ServerConfig, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "follower-relay: sequenced event fan-out server",
    long_about = None
)]
struct Cli {
    /// JSON configuration file. A missing file means built-in defaults.
    #[arg(short, long, default_value = "config/conf.json")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace). Overrides the file.
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Settings as key=value, e.g. eventListenerPort=9090 sequenceNumber=1.
    #[arg(value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, source) = match ServerConfig::load_or_default(&cli.config) {
        Ok(loaded) => loaded,
        Err(error) => {
            eprintln!("follower-relay: {error}");
            return ExitCode::FAILURE;
        }
    };
    let rejected = config.apply_overrides(&cli.overrides);
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    if let Err(error) = logging::init_tracing(config.log_level) {
        eprintln!("follower-relay: failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }

    match &source {
        ConfigSource::File(path) => info!(path = %path.display(), "configuration loaded"),
        ConfigSource::Defaults(path) => {
            warn!(path = %path.display(), "configuration file not found, using defaults");
        }
    }
    for error in &rejected {
        warn!(%error, "ignoring configuration override");
    }
    if let Err(error) = config.validate() {
        error!(%error, "refusing to start");
        return ExitCode::FAILURE;
    }

    let server = match Server::start(&config).await {
        Ok(server) => server,
        Err(error) => {
            error!(%error, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let mut signal_failed = false;
    let signal = async {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!(%signal, "signal received"),
            Err(error) => {
                error!(%error, "failed to install signal handlers");
                signal_failed = true;
            }
        }
    };

    let outcome = server.run_until(signal).await;
    match outcome {
        Ok(()) if !signal_failed => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(error) => {
            error!(%error, "shutdown reported failures");
            ExitCode::FAILURE
        }
    }
}
