//! nftgen CLI - Layered Trait Collection Generator
//!
//! Command-line interface for generating token collections.

use clap::Parser;
use env_logger::Env;
use log::{debug, error};

use nftgen::cli::commands::{self, RunOverrides};
use nftgen::cli::{Cli, Commands};
use nftgen::GenError;

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    debug!("nftgen v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = handle_command(&cli) {
        match e.downcast_ref::<GenError>() {
            Some(gen_err) => error!(
                "[{}] {:?} error: {:#}",
                gen_err.error_code(),
                gen_err.kind(),
                e
            ),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn handle_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run {
            output,
            amount,
            no_rarities,
            seed,
            concurrency,
        } => {
            let overrides = RunOverrides {
                output: output.clone(),
                amount: *amount,
                seed: *seed,
                concurrency: *concurrency,
            };
            commands::run(&cli.config, &overrides, !*no_rarities)
        }
        Commands::Upload { path } => commands::upload(&cli.config, path),
    }
}
