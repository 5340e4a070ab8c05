//! CLI Module
//!
//! Command-line interface for the nftgen collection generator.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nftgen - layered trait collection generator
#[derive(Parser, Debug)]
#[command(name = "nftgen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable DEBUG log level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file
    #[arg(short, long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the token generation
    #[command(name = "run")]
    Run {
        /// Override output dir from config file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Number of tokens to generate
        #[arg(short = 'n', long)]
        amount: Option<u32>,

        /// Skip writing rarities.json
        #[arg(long)]
        no_rarities: bool,

        /// Seed for reproducible trait draws
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum simultaneous image writers
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Upload a file or directory to IPFS and print its CID
    #[command(name = "upload")]
    Upload {
        /// File or directory to upload
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["nftgen", "-v", "run", "-n", "50", "--no-rarities"]);

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        match cli.command {
            Commands::Run {
                amount,
                no_rarities,
                output,
                ..
            } => {
                assert_eq!(amount, Some(50));
                assert!(no_rarities);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::parse_from(["nftgen", "upload", "-c", "other.json", "out/images"]);

        assert_eq!(cli.config, PathBuf::from("other.json"));
        assert!(matches!(cli.command, Commands::Upload { .. }));
    }
}
