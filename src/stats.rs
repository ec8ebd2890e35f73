use crate::models::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-title outcome counters for one sync run
#[derive(Default)]
pub struct SyncStats {
    cards_synced: AtomicU64,
    cards_skipped: AtomicU64,
    cards_failed: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_synced(&self) {
        self.cards_synced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.cards_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.cards_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: Outcome) {
        match outcome {
            Outcome::Synced => self.inc_synced(),
            Outcome::Skipped => self.inc_skipped(),
            Outcome::Failed => self.inc_failed(),
        }
    }

    pub fn synced(&self) -> u64 {
        self.cards_synced.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.cards_skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.cards_failed.load(Ordering::Relaxed)
    }

    /// Titles with any outcome so far
    pub fn processed(&self) -> u64 {
        self.synced() + self.skipped() + self.failed()
    }
}
