use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected while matching source records
#[derive(Debug, Default)]
pub struct MatchStats {
    pub records_processed: AtomicU64,
    pub records_matched: AtomicU64,
    pub records_skipped: AtomicU64,
    pub records_truncated: AtomicU64,
    pub pairs_found: AtomicU64,
    pub results_written: AtomicU64,
}

impl MatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_matched(&self) {
        self.records_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_truncated(&self) {
        self.records_truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pairs(&self, count: u64) {
        self.pairs_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_written(&self, count: u64) {
        self.results_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }

    pub fn matched(&self) -> u64 {
        self.records_matched.load(Ordering::Relaxed)
    }

    /// Processed records in which nothing was found
    pub fn unmatched(&self) -> u64 {
        self.processed().saturating_sub(self.matched())
    }

    pub fn skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn truncated(&self) -> u64 {
        self.records_truncated.load(Ordering::Relaxed)
    }

    pub fn pairs(&self) -> u64 {
        self.pairs_found.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.results_written.load(Ordering::Relaxed)
    }
}
