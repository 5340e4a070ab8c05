//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::generate::Generator;
use crate::upload::{IpfsUploader, Uploader};

/// Options of the `run` command that override the config file
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub output: Option<PathBuf>,
    pub amount: Option<u32>,
    pub seed: Option<u64>,
    pub concurrency: Option<usize>,
}

impl RunOverrides {
    /// Apply the overrides before the catalog sizes its budgets.
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(amount) = self.amount.filter(|n| *n > 0) {
            config.n = amount;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(concurrency) = self.concurrency.filter(|c| *c > 0) {
            config.concurrency = concurrency;
        }
    }
}

/// Generate the collection and optionally its rarity report.
pub fn run(config_path: &Path, overrides: &RunOverrides, rarities: bool) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    overrides.apply(&mut config);

    info!(
        "Producing {} tokens into {} ({} parallel writers)",
        config.n,
        config.output_dir.display(),
        config.concurrency
    );

    let mut generator = Generator::new(config).context("preparing generator")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing tokens in flight");
                on_interrupt.cancel();
            }
        });

        let report = generator.generate(cancel.clone()).await;
        cancel.cancel();
        report
    })?;

    println!(
        "Generated {}/{} tokens: {} persisted, {} failed, {} dropped",
        report.generated, report.requested, report.persisted, report.failed, report.dropped
    );

    if rarities {
        let path = generator.write_rarities()?;
        println!("Rarities: {}", path.display());
    }

    match report.exhausted {
        Some(err) if err.is_fatal() => bail!(err),
        Some(err) => {
            warn!("Generation stopped early: {}", err);
            Ok(())
        }
        None => Ok(()),
    }
}

/// Upload `path` with the IPFS settings from the config file.
pub fn upload(config_path: &Path, path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let Some(ipfs) = config.ipfs.as_ref() else {
        bail!("no ipfs section in {}", config_path.display());
    };

    let uploader = IpfsUploader::new(ipfs)?;
    info!(
        "Uploading {} to {} ({})",
        path.display(),
        uploader.endpoint(),
        if uploader.has_credentials() {
            "authenticated"
        } else {
            "anonymous"
        }
    );
    let cid = uploader
        .upload(path)
        .with_context(|| format!("uploading {}", path.display()))?;

    println!("{}", cid);
    Ok(())
}
