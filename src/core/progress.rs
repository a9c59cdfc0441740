//! Progress aggregation and broadcast.
//!
//! One [`ProgressAggregator`] exists per run. Every terminal job outcome is
//! folded into its snapshot under an exclusive lock and the resulting snapshot
//! is published on a `tokio::sync::broadcast` channel. Publishing never waits:
//! with no receivers the send is dropped, and a receiver that falls behind the
//! channel capacity skips the oldest snapshots.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::util::{CredentialId, RunId};

/// Default broadcast channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Terminal status of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Delivered.
    Sent {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Gave up after the last allowed attempt or a permanent error.
    Failed {
        /// Retries made after the first attempt.
        retries: u32,
        /// Last error seen.
        error: String,
    },
    /// Not attempted because the assigned credential had no quota left.
    Skipped {
        /// Why the job was not attempted.
        reason: String,
    },
    /// The run was cancelled before the job reached another outcome.
    Cancelled,
}

impl DeliveryStatus {
    /// Whether this status counts as a successful send.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent { .. } => f.write_str("Sent"),
            Self::Failed { retries: 0, error } => write!(f, "Failed. Error: {error}"),
            Self::Failed { retries, error } => {
                write!(f, "Failed after {retries} retries. Error: {error}")
            }
            Self::Skipped { reason } => write!(f, "Skipped: {reason}"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// One row of the status list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Position of the job in the submitted list.
    pub job_index: usize,
    /// Recipient address.
    pub recipient: String,
    /// Credential the job was assigned to.
    pub credential: CredentialId,
    /// Structured status.
    pub status: DeliveryStatus,
    /// Human-readable status label.
    pub label: String,
}

impl StatusEntry {
    /// Build an entry, deriving the label from `status`.
    pub fn new(
        job_index: usize,
        recipient: impl Into<String>,
        credential: CredentialId,
        status: DeliveryStatus,
    ) -> Self {
        let label = status.to_string();
        Self {
            job_index,
            recipient: recipient.into(),
            credential,
            status,
            label,
        }
    }
}

/// Consolidated progress of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Run this snapshot belongs to.
    pub run_id: RunId,
    /// Jobs submitted to the run.
    pub total_count: usize,
    /// Jobs delivered.
    pub sent_count: usize,
    /// Jobs terminally failed.
    pub failed_count: usize,
    /// Jobs skipped or cancelled.
    pub skipped_count: usize,
    /// `sent_count / total_count * 100`, or 0 for an empty run.
    pub percent_complete: f64,
    /// Set once every job has a status.
    pub finished: bool,
    /// Statuses in the order outcomes were recorded.
    pub statuses: Vec<StatusEntry>,
}

impl ProgressSnapshot {
    /// Empty snapshot for `total` jobs.
    #[must_use]
    pub fn new(run_id: RunId, total: usize) -> Self {
        Self {
            run_id,
            total_count: total,
            ..Self::default()
        }
    }

    /// Jobs with any recorded status.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.statuses.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute_percent(&mut self) {
        self.percent_complete = if self.total_count == 0 {
            0.0
        } else {
            self.sent_count as f64 / self.total_count as f64 * 100.0
        };
    }
}

/// Thread-safe accumulator of job outcomes for one run.
pub struct ProgressAggregator {
    snapshot: Mutex<ProgressSnapshot>,
    tx: broadcast::Sender<ProgressSnapshot>,
}

impl ProgressAggregator {
    /// Create an aggregator with its own broadcast channel.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self::with_sender(tx)
    }

    /// Create an aggregator that publishes on an existing channel.
    #[must_use]
    pub fn with_sender(tx: broadcast::Sender<ProgressSnapshot>) -> Self {
        Self {
            snapshot: Mutex::new(ProgressSnapshot::default()),
            tx,
        }
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Zero the snapshot for a new run of `total` jobs and publish it.
    pub fn reset(&self, run_id: RunId, total: usize) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.lock();
        *snapshot = ProgressSnapshot::new(run_id, total);
        snapshot.finished = total == 0;
        self.publish(&snapshot)
    }

    /// Fold one terminal outcome into the snapshot and publish the result.
    pub fn record(&self, entry: StatusEntry) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.lock();
        match entry.status {
            DeliveryStatus::Sent { .. } => snapshot.sent_count += 1,
            DeliveryStatus::Failed { .. } => snapshot.failed_count += 1,
            DeliveryStatus::Skipped { .. } | DeliveryStatus::Cancelled => {
                snapshot.skipped_count += 1;
            }
        }
        snapshot.recompute_percent();
        snapshot.statuses.push(entry);
        self.publish(&snapshot)
    }

    /// Mark the run finished and publish the final snapshot.
    pub fn finish(&self) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.lock();
        snapshot.finished = true;
        self.publish(&snapshot)
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.lock().clone()
    }

    // Sent while the lock is held so subscribers observe snapshots in order.
    fn publish(&self, snapshot: &ProgressSnapshot) -> ProgressSnapshot {
        let copy = snapshot.clone();
        if self.tx.send(copy.clone()).is_err() {
            tracing::trace!("no progress subscribers");
        }
        copy
    }
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}
