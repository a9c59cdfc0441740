//! Durable delivery log sinks.
//!
//! The dispatcher writes exactly one record per terminal job outcome. Sinks are
//! write-only from the dispatcher's point of view; the in-memory sink exposes
//! its buffer for tests and dashboards.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;
use crate::util::{CredentialId, RunId};

/// Which log a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Successful sends.
    Success,
    /// Failed, skipped and cancelled jobs.
    Error,
}

/// One terminal outcome as written to a durable log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryRecord {
    /// Message delivered.
    Sent {
        /// Run that produced the record.
        run_id: RunId,
        /// Recipient address.
        recipient: String,
        /// Credential used.
        credential: CredentialId,
        /// Milliseconds since epoch.
        at_ms: u128,
    },
    /// Job gave up.
    Failed {
        /// Run that produced the record.
        run_id: RunId,
        /// Recipient address.
        recipient: String,
        /// Credential used.
        credential: CredentialId,
        /// Last error text.
        error: String,
        /// Milliseconds since epoch.
        at_ms: u128,
    },
    /// Job was never attempted or was cut short.
    Skipped {
        /// Run that produced the record.
        run_id: RunId,
        /// Recipient address.
        recipient: String,
        /// Credential the job was assigned to.
        credential: CredentialId,
        /// Why it was skipped.
        reason: String,
        /// Milliseconds since epoch.
        at_ms: u128,
    },
}

impl DeliveryRecord {
    /// Record for a delivered message, stamped now.
    pub fn sent(run_id: RunId, recipient: impl Into<String>, credential: CredentialId) -> Self {
        Self::Sent {
            run_id,
            recipient: recipient.into(),
            credential,
            at_ms: now_ms(),
        }
    }

    /// Record for a failed job, stamped now.
    pub fn failed(
        run_id: RunId,
        recipient: impl Into<String>,
        credential: CredentialId,
        error: impl Into<String>,
    ) -> Self {
        Self::Failed {
            run_id,
            recipient: recipient.into(),
            credential,
            error: error.into(),
            at_ms: now_ms(),
        }
    }

    /// Record for a skipped or cancelled job, stamped now.
    pub fn skipped(
        run_id: RunId,
        recipient: impl Into<String>,
        credential: CredentialId,
        reason: impl Into<String>,
    ) -> Self {
        Self::Skipped {
            run_id,
            recipient: recipient.into(),
            credential,
            reason: reason.into(),
            at_ms: now_ms(),
        }
    }

    /// Target log.
    #[must_use]
    pub const fn kind(&self) -> LogKind {
        match self {
            Self::Sent { .. } => LogKind::Success,
            Self::Failed { .. } | Self::Skipped { .. } => LogKind::Error,
        }
    }

    /// Recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::Sent { recipient, .. }
            | Self::Failed { recipient, .. }
            | Self::Skipped { recipient, .. } => recipient,
        }
    }

    /// One-line human-readable form used by text logs.
    #[must_use]
    pub fn to_line(&self) -> String {
        match self {
            Self::Sent {
                recipient,
                credential,
                ..
            } => format!("Email sent to {recipient} successfully using {credential}."),
            Self::Failed {
                recipient,
                credential,
                error,
                ..
            } => format!("Failed to send email to {recipient} using {credential}. Error: {error}"),
            Self::Skipped {
                recipient,
                credential,
                reason,
                ..
            } => format!("Skipped email to {recipient} assigned to {credential}: {reason}"),
        }
    }
}

/// Delivery log abstraction.
///
/// Sinks are called from dispatch tasks while a lock is held, so `record`
/// should not block for long; buffer and push slow I/O to [`DeliveryLog::flush`],
/// which the dispatcher calls once at the end of every run.
pub trait DeliveryLog: Send {
    /// Append a record.
    fn record(&mut self, record: DeliveryRecord);

    /// Push buffered records to durable storage.
    fn flush(&mut self) {}
}

/// In-memory delivery log for testing and dev.
pub struct InMemoryDeliveryLog {
    records: VecDeque<DeliveryRecord>,
    max_records: usize,
}

impl InMemoryDeliveryLog {
    /// Create a new in-memory log with a bounded buffer.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_records.min(1024)),
            max_records: max_records.max(1),
        }
    }

    /// Snapshot of stored records.
    #[must_use]
    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records.iter().cloned().collect()
    }

    /// Stored records destined for `kind`.
    #[must_use]
    pub fn records_of(&self, kind: LogKind) -> Vec<DeliveryRecord> {
        self.records.iter().filter(|r| r.kind() == kind).cloned().collect()
    }
}

impl DeliveryLog for InMemoryDeliveryLog {
    fn record(&mut self, record: DeliveryRecord) {
        if self.records.len() >= self.max_records {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// Sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDeliveryLog;

impl DeliveryLog for NullDeliveryLog {
    fn record(&mut self, _record: DeliveryRecord) {}
}
