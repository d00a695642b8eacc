use std::sync::atomic::{AtomicU64, Ordering};

use crate::Degradation;

/// Counters for partial failures and failed mutations
#[derive(Debug, Default)]
pub struct DegradationMetrics {
    retirement_failures: AtomicU64,
    snapshot_failures: AtomicU64,
    compensation_failures: AtomicU64,
    image_removal_failures: AtomicU64,
    mutations_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DegradationCounts {
    pub retirement_failures: u64,
    pub snapshot_failures: u64,
    pub compensation_failures: u64,
    pub image_removal_failures: u64,
    pub mutations_failed: u64,
}

impl DegradationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, degradation: &Degradation) {
        let counter = match degradation {
            Degradation::RetirementFailed { .. } => &self.retirement_failures,
            Degradation::SnapshotFailed { .. } => &self.snapshot_failures,
            Degradation::CompensationFailed { .. } => &self.compensation_failures,
            Degradation::ImageRemovalFailed { .. } => &self.image_removal_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.mutations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DegradationCounts {
        DegradationCounts {
            retirement_failures: self.retirement_failures.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
            compensation_failures: self.compensation_failures.load(Ordering::Relaxed),
            image_removal_failures: self.image_removal_failures.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
        }
    }
}
