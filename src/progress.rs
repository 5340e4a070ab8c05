//! Progress reporting
//!
//! Consumes one event per finished token and keeps a single
//! `Processed k/n` status line up to date.

use std::io::Write;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outcome of persisting one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Persisted { id: u32 },
    Failed { id: u32, reason: String },
}

impl ProgressEvent {
    pub fn id(&self) -> u32 {
        match self {
            ProgressEvent::Persisted { id } | ProgressEvent::Failed { id, .. } => *id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProgressEvent::Failed { .. })
    }
}

/// Totals seen by the reporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub processed: u32,
    pub failed: u32,
}

pub struct ProgressReporter<W: Write> {
    total: u32,
    out: W,
    summary: ProgressSummary,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(total: u32, out: W) -> Self {
        Self {
            total,
            out,
            summary: ProgressSummary::default(),
        }
    }

    /// Report events until cancelled or every sender is gone.
    ///
    /// Events already queued when the cancellation arrives are still counted.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ProgressEvent>,
        cancel: CancellationToken,
    ) -> ProgressSummary {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.record(&event),
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        // Output is best effort; a closed terminal must not fail the batch.
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.summary
    }

    fn record(&mut self, event: &ProgressEvent) {
        self.summary.processed += 1;
        if event.is_failure() {
            self.summary.failed += 1;
        }
        let _ = write!(
            self.out,
            "\r => Processed {}/{} tokens",
            self.summary.processed, self.total
        );
        let _ = self.out.flush();
    }
}
