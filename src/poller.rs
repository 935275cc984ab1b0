//! The poll scheduler.
//!
//! [`start_polling`] drives the sync core over a fixed snapshot of
//! document ids, forever. The resilience contract: one document's failure
//! never stops the rest of the cycle, a whole cycle's worth of failures
//! never stops the loop, and the interval between cycles is fixed — no
//! backoff. The only exit is process shutdown.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{PollSession, SyncOutcome};
use crate::sync::SyncEngine;

/// Per-cycle tallies, one bucket per sync outcome plus failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl CycleStats {
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.failed
    }
}

/// Run one poll cycle: every document in `document_ids`, in order,
/// sequentially. Failures are tallied and logged, never propagated — the
/// remaining documents are always attempted.
pub async fn run_cycle(
    engine: &SyncEngine,
    tenant_id: &str,
    document_ids: &[String],
) -> CycleStats {
    let mut stats = CycleStats::default();

    for document_id in document_ids {
        match engine.sync_document(document_id, tenant_id).await {
            Ok(outcome) => stats.record(outcome),
            Err(err) => {
                warn!(document_id = %document_id, error = %err, "document sync failed");
                stats.failed += 1;
            }
        }
    }

    stats
}

/// Start a detached polling loop for the session's document snapshot.
///
/// The returned handle is informational; no cancellation is exposed and the
/// loop runs until the process exits. Each cycle completes fully before the
/// fixed-interval sleep, so cycles never overlap.
pub fn start_polling(engine: Arc<SyncEngine>, session: PollSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            tenant_id = %session.tenant_id,
            documents = session.document_ids.len(),
            interval_secs = session.interval.as_secs(),
            "starting document polling"
        );

        loop {
            let stats = run_cycle(&engine, &session.tenant_id, &session.document_ids).await;
            info!(
                tenant_id = %session.tenant_id,
                created = stats.created,
                updated = stats.updated,
                unchanged = stats.unchanged,
                failed = stats.failed,
                "poll cycle complete"
            );
            tokio::time::sleep(session.interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_bucket_by_outcome() {
        let mut stats = CycleStats::default();
        stats.record(SyncOutcome::Created);
        stats.record(SyncOutcome::Updated);
        stats.record(SyncOutcome::Updated);
        stats.record(SyncOutcome::Unchanged);
        stats.failed += 1;

        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 5);
    }
}
