//! Core dispatch abstractions: quota accounting, credential selection, retry
//! policy, progress aggregation and the scheduler that ties them together.

pub mod credential_pool;
pub mod delivery_log;
pub mod error;
pub mod job;
pub mod progress;
pub mod quota;
pub mod retry;
pub mod scheduler;
pub mod transport;

pub use credential_pool::{Credential, CredentialPool, CredentialSlot, CredentialUsage};
pub use delivery_log::{DeliveryLog, DeliveryRecord, InMemoryDeliveryLog, LogKind, NullDeliveryLog};
pub use error::{AppResult, DispatchError, SendError, ValidationError};
pub use job::{is_valid_address, ComposedMessage, Job};
pub use progress::{DeliveryStatus, ProgressAggregator, ProgressSnapshot, StatusEntry};
pub use quota::QuotaTracker;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{
    Dispatcher, RunHandle, RunReport, SharedDeliveryLog, Spawn, ABORTED_TASK_ERROR,
};
pub use transport::MailTransport;
