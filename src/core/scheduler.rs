//! Dispatch scheduler and run lifecycle.
//!
//! A [`Dispatcher`] owns the long-lived pieces (credential sources, transport,
//! delivery log, progress channel) and admits one run at a time. Each run gets
//! a fresh `RunContext`: a shuffled [`CredentialPool`], a zeroed
//! [`ProgressAggregator`], a worker budget and a cancellation token. The
//! context is dropped when the run completes.
//!
//! Every job is one spawned task running an explicit attempt loop. A worker
//! permit is held only while an attempt talks to the transport, so jobs that
//! are backing off do not occupy a worker.
//!
//! The run itself is a spawned task too and owns the run guard, so the guard is
//! released only after the last job task has reported back, whatever happens to
//! the caller that started it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, OwnedMutexGuard, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BatchShaping, DispatchConfig, ExhaustionPolicy};
use crate::core::{
    ComposedMessage, CredentialPool, CredentialSlot, CredentialUsage, DeliveryLog, DeliveryRecord,
    DeliveryStatus, DispatchError, Job, MailTransport, NullDeliveryLog, ProgressAggregator,
    ProgressSnapshot, RetryDecision, RetryPolicy, SendError, StatusEntry,
};
use crate::util::{CredentialId, RunId};

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Error recorded for a job whose task ended without reporting an outcome.
pub const ABORTED_TASK_ERROR: &str = "send task ended without an outcome";

/// Shared, lockable delivery log.
pub type SharedDeliveryLog = Arc<Mutex<Box<dyn DeliveryLog>>>;

/// Final account of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Final progress snapshot; `finished` is always set.
    pub snapshot: ProgressSnapshot,
    /// Per-credential usage in pool order.
    pub usage: Vec<CredentialUsage>,
    /// Wall time from start to the last outcome.
    pub elapsed: Duration,
}

/// Handle to a run started with [`Dispatcher::start_run`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    report: oneshot::Receiver<RunReport>,
}

impl RunHandle {
    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cancellation. Attempts already talking to the transport finish;
    /// every other job is recorded as cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Aborted`] if the run task ended without a
    /// report.
    pub async fn wait(self) -> Result<RunReport, DispatchError> {
        self.report
            .await
            .map_err(|_| DispatchError::Aborted(format!("run {} dropped its report", self.run_id)))
    }

    /// Like [`RunHandle::wait`], but cancels the run if this future is dropped
    /// before the report arrives.
    async fn wait_or_cancel(self) -> Result<RunReport, DispatchError> {
        let on_drop = self.cancel.clone().drop_guard();
        let report = self.wait().await;
        let _ = on_drop.disarm();
        report
    }
}

/// Everything one run needs, owned by that run.
pub(crate) struct RunContext<T> {
    run_id: RunId,
    pool: CredentialPool,
    progress: Arc<ProgressAggregator>,
    policy: RetryPolicy,
    exhaustion: ExhaustionPolicy,
    fallback_text: String,
    transport: Arc<T>,
    log: SharedDeliveryLog,
    permits: Semaphore,
    cancel: CancellationToken,
    rng: Mutex<StdRng>,
}

impl<T> RunContext<T>
where
    T: MailTransport,
{
    async fn execute<S>(
        self: Arc<Self>,
        jobs: Vec<Job>,
        batch: Option<BatchShaping>,
        spawner: S,
    ) -> RunReport
    where
        S: Spawn,
    {
        let started = Instant::now();
        let total = jobs.len();
        info!(
            run_id = %self.run_id,
            jobs = total,
            credentials = self.pool.len(),
            workers = self.permits.available_permits(),
            "dispatch run started"
        );

        let batch_size = batch.as_ref().map_or(total.max(1), |b| b.size.max(1));
        let mut pending = jobs.into_iter().enumerate().peekable();
        while pending.peek().is_some() {
            let chunk: Vec<(usize, Job)> = pending.by_ref().take(batch_size).collect();
            self.dispatch_batch(chunk, &spawner).await;

            if let Some(shape) = &batch {
                if pending.peek().is_some() && !self.cancel.is_cancelled() {
                    debug!(run_id = %self.run_id, pause_ms = shape.pause_ms, "pausing between batches");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {}
                        () = tokio::time::sleep(Duration::from_millis(shape.pause_ms)) => {}
                    }
                }
            }
        }

        self.log.lock().flush();
        let snapshot = self.progress.finish();
        let elapsed = started.elapsed();
        info!(
            run_id = %self.run_id,
            sent = snapshot.sent_count,
            failed = snapshot.failed_count,
            skipped = snapshot.skipped_count,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "dispatch run finished"
        );
        RunReport {
            run_id: self.run_id,
            snapshot,
            usage: self.pool.usage(),
            elapsed,
        }
    }

    /// Assign and spawn every job of `chunk`, then wait for all of them.
    async fn dispatch_batch<S>(self: &Arc<Self>, chunk: Vec<(usize, Job)>, spawner: &S)
    where
        S: Spawn,
    {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(usize, DeliveryStatus)>();
        let mut outstanding: HashMap<usize, (String, CredentialSlot)> = HashMap::new();

        for (index, job) in chunk {
            let assigned = self.pool.select_for(index);
            if self.cancel.is_cancelled() {
                self.finish_cancelled(index, job.recipient(), assigned, false);
                continue;
            }
            let Some(slot) = self.reserve(assigned) else {
                self.finish_skipped(index, job.recipient(), assigned);
                continue;
            };
            if slot != assigned {
                debug!(
                    run_id = %self.run_id,
                    job = index,
                    from = %self.pool.credential(assigned),
                    to = %self.pool.credential(slot),
                    "reassigned job from exhausted credential"
                );
            }

            outstanding.insert(index, (job.recipient().to_owned(), slot));
            let ctx = Arc::clone(self);
            let tx = done_tx.clone();
            spawner.spawn(async move {
                let status = ctx.drive(index, job, slot).await;
                let _ = tx.send((index, status));
            });
        }
        drop(done_tx);

        while let Some((index, _status)) = done_rx.recv().await {
            outstanding.remove(&index);
        }

        // Tasks that died (a panicking transport) never reported back.
        if !outstanding.is_empty() {
            error!(
                run_id = %self.run_id,
                missing = outstanding.len(),
                "dispatch tasks ended without an outcome"
            );
        }
        let mut lost: Vec<_> = outstanding.into_iter().collect();
        lost.sort_unstable_by_key(|(index, _)| *index);
        for (index, (recipient, slot)) in lost {
            self.finish_aborted(index, &recipient, slot);
        }
    }

    fn reserve(&self, assigned: CredentialSlot) -> Option<CredentialSlot> {
        match self.exhaustion {
            ExhaustionPolicy::Skip => self.pool.try_reserve(assigned).then_some(assigned),
            ExhaustionPolicy::Reassign => self.pool.reserve_next_usable(assigned),
        }
    }

    /// Attempt loop for one job holding a reservation on `slot`.
    async fn drive(&self, index: usize, job: Job, slot: CredentialSlot) -> DeliveryStatus {
        let credential = self.pool.credential(slot).clone();
        let message = job.compose(&self.fallback_text);
        let mut attempt: u32 = 0;

        loop {
            let Some(result) = self.attempt(&credential, &message).await else {
                return self.finish_cancelled(index, job.recipient(), slot, true);
            };

            let err = match result {
                Ok(()) => return self.finish_sent(index, job.recipient(), slot, attempt + 1),
                Err(err) => err,
            };

            let decision = {
                let mut rng = self.rng.lock();
                self.policy.decide(&err, attempt, &mut *rng)
            };
            match decision {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        run_id = %self.run_id,
                        recipient = job.recipient(),
                        credential = %credential,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "send attempt failed, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            return self.finish_cancelled(index, job.recipient(), slot, true);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                RetryDecision::Abandon => {
                    return self.finish_failed(index, job.recipient(), slot, attempt, &err.to_string());
                }
            }
        }
    }

    /// One transport call under a worker permit. `None` means the run was
    /// cancelled before the call started.
    async fn attempt(
        &self,
        credential: &CredentialId,
        message: &ComposedMessage,
    ) -> Option<Result<(), SendError>> {
        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return None,
            permit = self.permits.acquire() => permit.ok()?,
        };
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(self.transport.send(credential, message).await)
    }

    fn finish_sent(
        &self,
        index: usize,
        recipient: &str,
        slot: CredentialSlot,
        attempts: u32,
    ) -> DeliveryStatus {
        let credential = self.pool.credential(slot).clone();
        if let Err(e) = self.pool.record_sent(slot) {
            error!(run_id = %self.run_id, error = %e, "send completed without quota reservation");
        }
        info!(
            run_id = %self.run_id,
            recipient,
            credential = %credential,
            attempts,
            "message sent"
        );
        let status = DeliveryStatus::Sent { attempts };
        self.write_log(DeliveryRecord::sent(self.run_id, recipient, credential.clone()));
        self.progress
            .record(StatusEntry::new(index, recipient, credential, status.clone()));
        status
    }

    fn finish_failed(
        &self,
        index: usize,
        recipient: &str,
        slot: CredentialSlot,
        retries: u32,
        error: &str,
    ) -> DeliveryStatus {
        let credential = self.pool.credential(slot).clone();
        self.pool.release(slot);
        error!(
            run_id = %self.run_id,
            recipient,
            credential = %credential,
            retries,
            error,
            "message failed"
        );
        let status = DeliveryStatus::Failed {
            retries,
            error: error.to_owned(),
        };
        self.write_log(DeliveryRecord::failed(
            self.run_id,
            recipient,
            credential.clone(),
            error,
        ));
        self.progress
            .record(StatusEntry::new(index, recipient, credential, status.clone()));
        status
    }

    fn finish_aborted(&self, index: usize, recipient: &str, slot: CredentialSlot) -> DeliveryStatus {
        self.finish_failed(index, recipient, slot, 0, ABORTED_TASK_ERROR)
    }

    fn finish_skipped(&self, index: usize, recipient: &str, slot: CredentialSlot) -> DeliveryStatus {
        let credential = self.pool.credential(slot).clone();
        let reason = DispatchError::QuotaExhausted(credential.clone()).to_string();
        warn!(
            run_id = %self.run_id,
            recipient,
            credential = %credential,
            "skipping job: quota exhausted"
        );
        let status = DeliveryStatus::Skipped {
            reason: reason.clone(),
        };
        self.write_log(DeliveryRecord::skipped(
            self.run_id,
            recipient,
            credential.clone(),
            reason,
        ));
        self.progress
            .record(StatusEntry::new(index, recipient, credential, status.clone()));
        status
    }

    fn finish_cancelled(
        &self,
        index: usize,
        recipient: &str,
        slot: CredentialSlot,
        reserved: bool,
    ) -> DeliveryStatus {
        let credential = self.pool.credential(slot).clone();
        if reserved {
            self.pool.release(slot);
        }
        debug!(run_id = %self.run_id, recipient, "job cancelled");
        let status = DeliveryStatus::Cancelled;
        self.write_log(DeliveryRecord::skipped(
            self.run_id,
            recipient,
            credential.clone(),
            "run cancelled",
        ));
        self.progress
            .record(StatusEntry::new(index, recipient, credential, status.clone()));
        status
    }

    fn write_log(&self, record: DeliveryRecord) {
        self.log.lock().record(record);
    }
}

/// Long-lived dispatcher admitting one run at a time.
pub struct Dispatcher<T, S> {
    config: DispatchConfig,
    sources: Vec<CredentialId>,
    transport: Arc<T>,
    log: SharedDeliveryLog,
    spawner: S,
    seed: Option<u64>,
    progress_tx: broadcast::Sender<ProgressSnapshot>,
    run_guard: Arc<tokio::sync::Mutex<()>>,
    current: Mutex<Option<Arc<ProgressAggregator>>>,
}

impl<T, S> Dispatcher<T, S>
where
    T: MailTransport,
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a dispatcher over `sources` using `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        config: DispatchConfig,
        sources: Vec<CredentialId>,
        transport: T,
        spawner: S,
    ) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::InvalidConfig)?;
        let (progress_tx, _rx) = broadcast::channel(config.broadcast_capacity);
        Ok(Self {
            config,
            sources,
            transport: Arc::new(transport),
            log: Arc::new(Mutex::new(Box::new(NullDeliveryLog))),
            spawner,
            seed: None,
            progress_tx,
            run_guard: Arc::new(tokio::sync::Mutex::new(())),
            current: Mutex::new(None),
        })
    }

    /// Attach a delivery log.
    #[must_use]
    pub fn with_delivery_log(mut self, log: Box<dyn DeliveryLog>) -> Self {
        self.log = Arc::new(Mutex::new(log));
        self
    }

    /// Attach a delivery log shared with the caller.
    #[must_use]
    pub fn with_shared_delivery_log(mut self, log: SharedDeliveryLog) -> Self {
        self.log = log;
        self
    }

    /// Seed credential shuffling and jitter so runs are reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Credential sources, in load order.
    #[must_use]
    pub fn sources(&self) -> &[CredentialId] {
        &self.sources
    }

    /// Subscribe to progress snapshots of this and all later runs.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Snapshot of the active or most recent run.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<ProgressSnapshot> {
        self.current.lock().as_ref().map(|p| p.snapshot())
    }

    /// Whether a run currently holds the run guard.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Start a run in the background and return immediately.
    ///
    /// Dropping the returned handle does not stop the run.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RunInProgress`] while another run is active and
    /// [`DispatchError::NoCredentials`] when there are no sources.
    pub fn start_run(&self, jobs: Vec<Job>) -> Result<RunHandle, DispatchError> {
        self.launch(jobs, CancellationToken::new(), None)
    }

    /// Run to completion.
    ///
    /// Dropping the returned future cancels the run. The dispatcher stays busy
    /// until attempts already in flight have finished.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::start_run`].
    pub async fn run(&self, jobs: Vec<Job>) -> Result<RunReport, DispatchError> {
        self.run_until_cancelled(jobs, CancellationToken::new()).await
    }

    /// Run to completion or until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::start_run`].
    pub async fn run_until_cancelled(
        &self,
        jobs: Vec<Job>,
        cancel: CancellationToken,
    ) -> Result<RunReport, DispatchError> {
        let handle = self.launch(jobs, cancel.child_token(), None)?;
        handle.wait_or_cancel().await
    }

    /// Run to completion over a caller-built pool instead of the dispatcher's
    /// sources. The pool's order is used as-is.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RunInProgress`] while another run is active.
    pub async fn run_with_pool(
        &self,
        jobs: Vec<Job>,
        pool: CredentialPool,
    ) -> Result<RunReport, DispatchError> {
        let handle = self.launch(jobs, CancellationToken::new(), Some(pool))?;
        handle.wait_or_cancel().await
    }

    /// Spawn the run task. The run guard moves into it and is dropped only
    /// after every job task has reported back.
    fn launch(
        &self,
        jobs: Vec<Job>,
        cancel: CancellationToken,
        pool: Option<CredentialPool>,
    ) -> Result<RunHandle, DispatchError> {
        let (guard, ctx) = self.prepare(jobs.len(), cancel.clone(), pool)?;
        let run_id = ctx.run_id;
        let (tx, rx) = oneshot::channel();
        let batch = self.config.batch.clone();
        let spawner = self.spawner.clone();
        self.spawner.spawn(async move {
            let report = ctx.execute(jobs, batch, spawner).await;
            drop(guard);
            let _ = tx.send(report);
        });
        Ok(RunHandle {
            run_id,
            cancel,
            report: rx,
        })
    }

    fn prepare(
        &self,
        total: usize,
        cancel: CancellationToken,
        pool: Option<CredentialPool>,
    ) -> Result<(OwnedMutexGuard<()>, Arc<RunContext<T>>), DispatchError> {
        let guard = Arc::clone(&self.run_guard)
            .try_lock_owned()
            .map_err(|_| DispatchError::RunInProgress)?;

        let mut rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let pool = match pool {
            Some(pool) => pool,
            None => CredentialPool::initialize(
                self.sources.clone(),
                self.config.daily_limit,
                &mut rng,
            )?,
        };
        let workers = self.config.concurrency_for(pool.len());

        let run_id = RunId::new();
        let progress = Arc::new(ProgressAggregator::with_sender(self.progress_tx.clone()));
        progress.reset(run_id, total);
        *self.current.lock() = Some(Arc::clone(&progress));

        let ctx = RunContext {
            run_id,
            pool,
            progress,
            policy: self.config.retry_policy(),
            exhaustion: self.config.exhaustion,
            fallback_text: self.config.fallback_text.clone(),
            transport: Arc::clone(&self.transport),
            log: Arc::clone(&self.log),
            permits: Semaphore::new(workers),
            cancel,
            rng: Mutex::new(rng),
        };
        Ok((guard, Arc::new(ctx)))
    }
}
