//! Progress reporting for per-entity jobs.

use crate::summary::RunSummary;
use tracing::{info, warn};

/// Per-entity outcome reported to progress listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    /// Every attempted category succeeded or was skipped.
    Ok,
    /// At least one category failed; the messages say which.
    Failed(Vec<String>),
}

/// Progress callback for long-running jobs.
pub trait HarvestProgress {
    /// Called when starting on an entity.
    fn on_start(&self, code: &str, name: &str, index: usize, total: usize);

    /// Called when an entity is done.
    fn on_complete(&self, code: &str, index: usize, total: usize, outcome: &EntityOutcome);

    /// Called when the whole batch is done.
    fn on_batch_complete(&self, summary: &RunSummary);
}

/// Reports through `tracing`.
pub struct LogProgress;

impl HarvestProgress for LogProgress {
    fn on_start(&self, code: &str, name: &str, index: usize, total: usize) {
        info!("[{}/{}] {code} ({name})", index + 1, total);
    }

    fn on_complete(&self, code: &str, _index: usize, _total: usize, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Ok => info!(code, "done"),
            EntityOutcome::Failed(reasons) => {
                warn!(code, failures = reasons.len(), "finished with failures: {}", reasons.join("; "))
            }
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        info!(
            selected = summary.selected,
            price_ok = summary.price.succeeded,
            price_failed = summary.price.failed,
            no_new_data = summary.no_new_data,
            financials_ok = summary.financials.succeeded,
            qualitative_ok = summary.qualitative.succeeded,
            "batch complete"
        );
    }
}

/// Discards every callback.
pub struct SilentProgress;

impl HarvestProgress for SilentProgress {
    fn on_start(&self, _code: &str, _name: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _code: &str, _index: usize, _total: usize, _outcome: &EntityOutcome) {}
    fn on_batch_complete(&self, _summary: &RunSummary) {}
}
