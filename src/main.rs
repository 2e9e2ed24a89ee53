mod app;
mod cli;
mod config;
mod consts;
mod cost;
mod error;
mod output;
mod pricing;
mod stats;
mod store;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::Config;

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "relaycost=debug"
    } else {
        "relaycost=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::load();
    let cli = Cli::parse().with_config(&config);
    init_tracing(cli.debug);

    match app::run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
