//! Live Upload Progress
//!
//! Renders ledger events as they arrive on the coordinator's broadcast
//! channel. The renderer keeps its own view of record states so the
//! progress bar survives retries and removals.

use std::collections::HashMap;

use console::style;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::types::{AssetId, AssetStatus};
use crate::upload::LedgerEvent;

/// Event-driven progress view of one upload session
#[derive(Debug, Default)]
pub struct UploadProgress {
    statuses: HashMap<AssetId, AssetStatus>,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print events until the channel closes
    pub fn spawn(mut events: broadcast::Receiver<LedgerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut progress = UploadProgress::new();
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(line) = progress.apply(&event) {
                            eprintln!("{}", line);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        eprintln!("{}", style(format!("  … {} event(s) skipped", skipped)).dim());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Fold an event into the view, returning the line to print
    pub fn apply(&mut self, event: &LedgerEvent) -> Option<String> {
        match event {
            LedgerEvent::RecordChanged {
                id,
                source_handle,
                status,
                committed_ref,
                error,
            } => {
                self.statuses.insert(id.clone(), *status);
                let bar = render_progress_bar(self.settled(), self.statuses.len(), 20);
                let detail = match status {
                    AssetStatus::Committed => {
                        format!("{} {}", style("✓").green(), committed_ref.as_deref().unwrap_or(""))
                    }
                    AssetStatus::Failed => {
                        format!("{} {}", style("✗").red(), error.as_deref().unwrap_or("failed"))
                    }
                    AssetStatus::Pending | AssetStatus::Uploading => {
                        style(status.to_string()).dim().to_string()
                    }
                };
                Some(format!("{} {} {}", bar, source_handle, detail))
            }
            LedgerEvent::RecordRemoved { id } => {
                self.statuses.remove(id);
                Some(format!("  removed {}", id))
            }
            LedgerEvent::Busy { in_flight } => {
                Some(format!("{} {} upload(s) in flight", style("↑").cyan(), in_flight))
            }
            LedgerEvent::Quiescent { committed, failed } => Some(format!(
                "{} settled: {} committed, {} failed",
                style("■").bold(),
                committed,
                failed
            )),
        }
    }

    /// Records that reached a terminal state
    pub fn settled(&self) -> usize {
        self.statuses.values().filter(|s| !s.is_in_flight()).count()
    }
}

fn render_progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }

    let progress = (completed as f32 / total as f32).min(1.0);
    let filled = (progress * width as f32) as usize;
    let empty = width.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}
