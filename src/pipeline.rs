//! Persistence pipeline
//!
//! Turns accepted tokens into `images/<id>.png` and `metadata/<id>.json`.
//! A dispatcher pulls tokens from the hand-off queue and starts one task per
//! token once a semaphore slot is free, so at most `concurrency` tokens are
//! being written at any instant. The batch is complete when the queue is
//! closed and every started task has finished.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::catalog::TraitCatalog;
use crate::compose::Compositor;
use crate::error::{GenError, Result};
use crate::output::OutputLayout;
use crate::progress::ProgressEvent;
use crate::token::Token;

/// Totals seen by the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Tokens handed to a persistence task
    pub dispatched: u32,
    /// Highest number of persistence tasks running at once
    pub peak_in_flight: usize,
    /// Tokens received but abandoned by cancellation before a slot freed up
    pub dropped: u32,
}

/// Writes the files of a single token
#[derive(Clone)]
pub struct TokenWriter {
    catalog: Arc<TraitCatalog>,
    compositor: Arc<dyn Compositor>,
    layout: OutputLayout,
}

impl TokenWriter {
    pub fn new(
        catalog: Arc<TraitCatalog>,
        compositor: Arc<dyn Compositor>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            catalog,
            compositor,
            layout,
        }
    }

    /// Compose and save the image (if the token has traits), then write
    /// the metadata document. Stops at the first failure.
    pub fn persist(&self, mut token: Token) -> Result<Token> {
        let id = token.id();

        if !token.attributes.is_empty() {
            let sources = self.source_images(&token)?;
            let image = self.compositor.compose(&sources)?;
            let path = self.layout.image_path(id);
            image.save(&path).map_err(|e| GenError::ImageWrite {
                path: path.clone(),
                source: e,
            })?;
            token.set_image_path(path.to_string_lossy());
        }

        let path = self.layout.metadata_path(id);
        let data = serde_json::to_string_pretty(&token)?;
        fs::write(&path, data).map_err(|e| GenError::MetadataWrite { path, source: e })?;

        Ok(token)
    }

    fn source_images(&self, token: &Token) -> Result<Vec<PathBuf>> {
        token
            .attributes
            .iter()
            .map(|a| {
                self.catalog
                    .image_path(a)
                    .ok_or_else(|| GenError::MissingTraitImage {
                        layer: a.layer.clone(),
                        value: a.value.clone(),
                    })
            })
            .collect()
    }
}

/// Bounded-concurrency dispatcher
pub struct PostProcessor {
    writer: TokenWriter,
    slots: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl PostProcessor {
    pub fn new(writer: TokenWriter, concurrency: usize) -> Self {
        Self {
            writer,
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Persist tokens until the queue closes or `cancel` fires, then wait
    /// for every started task.
    pub async fn run(
        self,
        mut tokens: mpsc::Receiver<Token>,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> DispatchSummary {
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;
        let mut dropped = 0;

        loop {
            let token = tokio::select! {
                _ = cancel.cancelled() => break,
                next = tokens.recv() => match next {
                    Some(token) => token,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Cancelled while token {} waited for a writer, not persisted", token.id());
                    dropped += 1;
                    break;
                }
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            while let Some(finished) = tasks.try_join_next() {
                log_join_failure(finished);
            }

            let writer = self.writer.clone();
            let progress = progress.clone();
            let in_flight = Arc::clone(&self.in_flight);
            let peak = Arc::clone(&self.peak);
            dispatched += 1;

            tasks.spawn(async move {
                let id = token.id();
                let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);

                let outcome = tokio::task::spawn_blocking(move || writer.persist(token)).await;

                in_flight.fetch_sub(1, Ordering::SeqCst);
                drop(permit);

                let event = match outcome {
                    Ok(Ok(_)) => {
                        debug!("Done with token {}", id);
                        ProgressEvent::Persisted { id }
                    }
                    Ok(Err(e)) => {
                        error!("Failed to persist token {} [{}]: {}", id, e.error_code(), e);
                        ProgressEvent::Failed {
                            id,
                            reason: e.to_string(),
                        }
                    }
                    Err(e) => {
                        error!("Persistence task for token {} panicked: {}", id, e);
                        ProgressEvent::Failed {
                            id,
                            reason: e.to_string(),
                        }
                    }
                };

                if progress.send(event).await.is_err() {
                    debug!("Progress reporter gone, dropping event for token {}", id);
                }
            });
        }

        tokens.close();
        while let Ok(token) = tokens.try_recv() {
            warn!("Cancelled before token {} was dispatched, not persisted", token.id());
            dropped += 1;
        }

        debug!("Waiting for {} persistence tasks to finish", tasks.len());
        while let Some(finished) = tasks.join_next().await {
            log_join_failure(finished);
        }

        DispatchSummary {
            dispatched,
            peak_in_flight: self.peak.load(Ordering::SeqCst),
            dropped,
        }
    }
}

fn log_join_failure(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!("Persistence task aborted: {}", e);
    }
}
