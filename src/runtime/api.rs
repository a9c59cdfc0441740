//! API-facing request/response models.
//!
//! These mirror the HTTP surface a front end drives: start a run from an
//! uploaded recipient list, then follow `progress_update` events.

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::{Dispatcher, MailTransport, ProgressSnapshot, RunHandle, Spawn};
use crate::infra::{load_job_list, DirContentResolver};
use crate::util::RunId;

/// Name of the event carrying progress snapshots.
pub const PROGRESS_EVENT: &str = "progress_update";

/// Message returned when a run is accepted.
pub const RUN_STARTED_MESSAGE: &str = "Email sending started";

/// Request to start a run from an uploaded recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunRequest {
    /// File name inside the configured job-list directory.
    pub email_list_filename: String,
}

/// Accepted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunResponse {
    /// Identifier of the new run.
    pub run_id: RunId,
    /// Human-readable acknowledgement.
    pub message: String,
    /// Jobs accepted for dispatch.
    pub accepted: usize,
    /// Lines rejected while parsing the list.
    pub rejected: Vec<String>,
}

/// Progress notification as pushed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Always [`PROGRESS_EVENT`].
    pub event: &'static str,
    /// Snapshot payload.
    #[serde(flatten)]
    pub snapshot: ProgressSnapshot,
}

impl From<ProgressSnapshot> for ProgressEvent {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            event: PROGRESS_EVENT,
            snapshot,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Whether a run is active.
    pub running: bool,
}

/// Validate `req`, load its recipient list and start a run.
///
/// Returns the handle alongside the response so the caller can wait on or
/// cancel the run.
///
/// # Errors
///
/// Returns the error text for an empty file name, an unreadable list, missing
/// content, or a run already in progress.
pub fn start_run<T, S>(
    dispatcher: &Dispatcher<T, S>,
    req: &StartRunRequest,
) -> Result<(StartRunResponse, RunHandle), String>
where
    T: MailTransport,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let file_name = req.email_list_filename.trim();
    if file_name.is_empty() {
        return Err("No email list filename provided".into());
    }
    let cfg: &DispatchConfig = dispatcher.config();
    let resolver = DirContentResolver::new(&cfg.content_dir);
    let list = load_job_list(&cfg.job_list_dir, file_name, &resolver).map_err(|e| e.to_string())?;
    let accepted = list.jobs.len();
    let rejected = list.rejected.iter().map(ToString::to_string).collect();
    let handle = dispatcher.start_run(list.jobs).map_err(|e| e.to_string())?;
    Ok((
        StartRunResponse {
            run_id: handle.run_id(),
            message: RUN_STARTED_MESSAGE.to_owned(),
            accepted,
            rejected,
        },
        handle,
    ))
}

/// Return a health payload.
pub fn health<T, S>(dispatcher: &Dispatcher<T, S>) -> Health
where
    T: MailTransport,
    S: Spawn + Clone + Send + Sync + 'static,
{
    Health {
        ok: true,
        running: dispatcher.is_running(),
    }
}
