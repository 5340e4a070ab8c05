//! nftgen - Layered Trait Collection Generator
//!
//! Generates collections of unique tokens by combining weighted traits from
//! image layers, then writes one composite image and one metadata document
//! per token plus an optional rarity report.
//!
//! # Architecture
//!
//! - `catalog`: resolves layers, weights and per-attribute budgets
//! - `builder`: single producer drawing unique, in-budget tokens
//! - `pipeline`: bounded-concurrency image and metadata writer
//! - `rarity`: post-run trait statistics

pub mod builder;
pub mod catalog;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rarity;
pub mod registry;
pub mod sampler;
pub mod token;
pub mod upload;

pub use config::Config;
pub use error::{GenError, Result};
pub use generate::{BatchReport, Generator};
pub use token::{Attribute, Token};
