use std::fmt;

use optima_core::Classify;
use serde::Serialize;
use tracing::{error, warn};

use crate::{DegradationMetrics, MutationError};

/// Stages a mutation passes through, in order. `Failed` can follow any of
/// the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStage {
    RecordMutated,
    AssetSynced,
    SnapshotPublished,
    Done,
    Failed,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationStage::RecordMutated => "record_mutated",
            MutationStage::AssetSynced => "asset_synced",
            MutationStage::SnapshotPublished => "snapshot_published",
            MutationStage::Done => "done",
            MutationStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A side effect that did not happen while the mutation itself succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Degradation {
    /// An old image object is left orphaned
    RetirementFailed { key: String, reason: String },

    /// The public snapshot still shows the previous state
    SnapshotFailed { code: &'static str, reason: String },

    /// A withdrawn image object could not be deleted
    CompensationFailed { key: String, reason: String },

    /// The image of a deleted record is still stored
    ImageRemovalFailed { version: u32, reason: String },
}

impl Degradation {
    pub fn kind(&self) -> &'static str {
        match self {
            Degradation::RetirementFailed { .. } => "retirement_failed",
            Degradation::SnapshotFailed { .. } => "snapshot_failed",
            Degradation::CompensationFailed { .. } => "compensation_failed",
            Degradation::ImageRemovalFailed { .. } => "image_removal_failed",
        }
    }
}

/// Successful mutation result with its stage trace
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub value: T,
    pub trace: Vec<MutationStage>,
    pub degradations: Vec<Degradation>,
}

impl<T> MutationOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn reached(&self, stage: MutationStage) -> bool {
        self.trace.contains(&stage)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> MutationOutcome<U> {
        MutationOutcome {
            value: f(self.value),
            trace: self.trace,
            degradations: self.degradations,
        }
    }
}

/// Tracks one running mutation
pub(crate) struct Progress<'a> {
    operation: &'static str,
    trace: Vec<MutationStage>,
    degradations: Vec<Degradation>,
    metrics: &'a DegradationMetrics,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(operation: &'static str, metrics: &'a DegradationMetrics) -> Self {
        Self {
            operation,
            trace: Vec::with_capacity(4),
            degradations: Vec::new(),
            metrics,
        }
    }

    pub(crate) fn advance(&mut self, stage: MutationStage) {
        self.trace.push(stage);
    }

    pub(crate) fn degrade(&mut self, degradation: Degradation) {
        warn!(
            operation = self.operation,
            degradation = degradation.kind(),
            detail = ?degradation,
            "mutation degraded"
        );
        self.metrics.record(&degradation);
        self.degradations.push(degradation);
    }

    /// Terminal failure. The error goes back to the caller unchanged.
    pub(crate) fn fail(mut self, err: MutationError) -> MutationError {
        let reached = self.trace.last().copied();
        self.trace.push(MutationStage::Failed);
        self.metrics.record_failure();
        error!(
            operation = self.operation,
            reached = ?reached,
            status = err.kind().status_code(),
            code = err.code(),
            error = %err,
            "mutation failed"
        );
        err
    }

    pub(crate) fn finish<T>(mut self, value: T) -> MutationOutcome<T> {
        self.trace.push(MutationStage::Done);
        MutationOutcome {
            value,
            trace: self.trace,
            degradations: self.degradations,
        }
    }
}
