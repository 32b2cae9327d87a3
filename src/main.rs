// src/main.rs

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

fn init_tracing(verbose: bool) {
    let level = if verbose || cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let run_span = tracing::span!(Level::INFO, "Run");
    run_span.in_scope(|| cli::run(cli))
}
