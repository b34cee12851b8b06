//! Counters/Telemetry façade (spec §2 C9): per-pass counts emitted as
//! structured log fields at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Counters {
    processed: AtomicU64,
    deleted: AtomicU64,
    merged: AtomicU64,
    merged_components: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Counters::default()
    }

    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_merged(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` component-part records folded into a host document by
    /// the projector's component-merging step (spec §4.2 step 3, C9's
    /// merged-component count), as distinct from the number of merged
    /// *documents* tracked by [`Counters::inc_merged`].
    pub fn add_merged_components(&self, count: u64) {
        self.merged_components.fetch_add(count, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn merged(&self) -> u64 {
        self.merged.load(Ordering::Relaxed)
    }

    pub fn merged_components(&self) -> u64 {
        self.merged_components.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self, pass: &str) {
        tracing::info!(
            pass,
            processed = self.processed(),
            deleted = self.deleted(),
            merged = self.merged(),
            merged_components = self.merged_components(),
            "pass complete"
        );
    }
}
