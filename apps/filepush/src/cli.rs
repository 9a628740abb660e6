//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use filepush_channel::DigestAlgorithm;

#[derive(Debug, Parser)]
#[command(name = "filepush", version, about = "Push a single file over raw TCP")]
pub struct Cli {
    /// Configuration file (defaults to the per-user config path).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the final report as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wait for one peer to connect and push FILE to it.
    Serve(ServeArgs),
    /// Connect to HOST:PORT and push FILE to it.
    Send(SendArgs),
    /// Connect to a serving peer and save what it pushes.
    Fetch(FetchArgs),
    /// Accept one sending peer and save what it pushes.
    Listen(ListenArgs),
    /// Print the digest of FILE.
    Digest(DigestArgs),
    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (0 = let the OS pick).
    #[arg(allow_negative_numbers = true)]
    pub port: i32,
    pub file: PathBuf,
    /// Accept timeout in milliseconds (0 = wait forever).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Address to bind instead of the configured one.
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    pub host: String,
    #[arg(allow_negative_numbers = true)]
    pub port: i32,
    pub file: PathBuf,
    /// Connect timeout in milliseconds (0 = wait forever).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    pub host: String,
    pub port: u16,
    /// Where to write the received bytes.
    pub dest: PathBuf,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    pub port: u16,
    pub dest: PathBuf,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Debug, Args)]
pub struct DigestArgs {
    pub file: PathBuf,
    /// md5 or sha256 (defaults to the configured algorithm).
    #[arg(long)]
    pub algorithm: Option<DigestAlgorithm>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}
