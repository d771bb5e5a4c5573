use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod endpoint;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the manager endpoint and send one or more messages.
    Send(SendArgs),
    /// Stand in for the manager: bind the endpoint and print received messages.
    Listen(ListenArgs),
    /// Print the resolved manager endpoint for this platform.
    Endpoint(EndpointArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Endpoint(args) => endpoint::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint path override (defaults to the well-known platform path).
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file", "heartbeat"])]
    pub data: Option<String>,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file", "heartbeat"])]
    pub json: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "json", "heartbeat"])]
    pub file: Option<PathBuf>,
    /// Send the conventional liveness heartbeat payload.
    #[arg(long, conflicts_with_all = ["data", "json", "file"])]
    pub heartbeat: bool,
    /// Send the payload this many times.
    #[arg(long, default_value = "1")]
    pub repeat: u64,
    /// Pause between repeated sends (e.g. 500ms, 2s).
    #[arg(long, default_value = "0ms")]
    pub interval: String,
    /// Maximum time to wait for the outbound queue to drain.
    #[arg(long, default_value = "5s")]
    pub drain_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint path override (defaults to the well-known platform path).
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct EndpointArgs {}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
