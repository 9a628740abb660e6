//! filepush command-line entry point.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigAction};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Configuration comes first so its log level can seed the filter.
    let config = config::Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting filepush");

    let rt = tokio::runtime::Runtime::new()?;
    let ok = rt.block_on(async {
        match cli.command {
            Command::Serve(args) => commands::serve(&config, args, cli.json).await,
            Command::Send(args) => commands::send(&config, args, cli.json).await,
            Command::Fetch(args) => commands::fetch(&config, args, cli.json).await,
            Command::Listen(args) => commands::listen(&config, args, cli.json).await,
            Command::Digest(args) => commands::digest(&config, args, cli.json).await,
            Command::Config { action } => match action {
                ConfigAction::Show => commands::show_config(&config, cli.config.as_deref()),
                ConfigAction::Init { force } => commands::init_config(cli.config.as_deref(), force),
            },
        }
    })?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
