//! Dispatcher configuration structures.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::progress::DEFAULT_BROADCAST_CAPACITY;
use crate::core::quota::DEFAULT_DAILY_LIMIT;
use crate::core::retry::RetryPolicy;
use crate::core::job::DEFAULT_FALLBACK_TEXT;

/// What to do with a job whose assigned credential has no quota left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Record the job as skipped.
    #[default]
    Skip,
    /// Move the job to the next credential with capacity, skipping only when
    /// every credential is exhausted.
    Reassign,
}

/// Optional rate shaping: dispatch in fixed-size batches with a pause between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShaping {
    /// Jobs per batch.
    pub size: usize,
    /// Pause after each batch except the last, in milliseconds.
    pub pause_ms: u64,
}

impl Default for BatchShaping {
    fn default() -> Self {
        Self {
            size: 50,
            pause_ms: 1000,
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Successful sends allowed per credential per run.
    pub daily_limit: u32,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff unit in milliseconds; attempt `k` waits `base * 2^k`.
    pub base_delay_ms: u64,
    /// Cap on a single backoff, in seconds.
    pub max_delay_secs: u64,
    /// Add `[0, 1)` s jitter to rate-limit backoffs.
    pub rate_limit_jitter: bool,
    /// Retry permanent transport errors instead of failing fast.
    pub retry_permanent: bool,
    /// Concurrent attempts; defaults to the number of credentials.
    pub max_concurrency: Option<usize>,
    /// Handling of jobs whose credential is exhausted.
    pub exhaustion: ExhaustionPolicy,
    /// Optional batching with pauses.
    pub batch: Option<BatchShaping>,
    /// Snapshots buffered per progress subscriber.
    pub broadcast_capacity: usize,
    /// Plain-text alternative attached to every message.
    pub fallback_text: String,
    /// Directory holding one credential file per sender account.
    pub credentials_dir: PathBuf,
    /// Extension of credential files, without the dot.
    pub credential_extension: String,
    /// Directory uploaded recipient lists are stored in.
    pub job_list_dir: PathBuf,
    /// Directory uploaded content files are stored in.
    pub content_dir: PathBuf,
    /// Append-only log of successful sends.
    pub success_log: PathBuf,
    /// Append-only log of failed and skipped jobs.
    pub error_log: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_secs: 300,
            rate_limit_jitter: true,
            retry_permanent: false,
            max_concurrency: None,
            exhaustion: ExhaustionPolicy::Skip,
            batch: None,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_owned(),
            credentials_dir: PathBuf::from("credentials"),
            credential_extension: "json".to_owned(),
            job_list_dir: PathBuf::from("upload_email"),
            content_dir: PathBuf::from("upload_content"),
            success_log: PathBuf::from("success.txt"),
            error_log: PathBuf::from("error.txt"),
        }
    }
}

impl DispatchConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.daily_limit == 0 {
            return Err("daily_limit must be greater than 0".into());
        }
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be greater than 0".into());
        }
        if self.max_delay_secs == 0 {
            return Err("max_delay_secs must be greater than 0".into());
        }
        if self.max_concurrency == Some(0) {
            return Err("max_concurrency must be greater than 0".into());
        }
        if self.broadcast_capacity == 0 {
            return Err("broadcast_capacity must be greater than 0".into());
        }
        if let Some(batch) = &self.batch {
            if batch.size == 0 {
                return Err("batch.size must be greater than 0".into());
            }
        }
        if self.credential_extension.is_empty() {
            return Err("credential_extension must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns parse or validation failures as text.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DISPATCH_*` environment variables, loading a
    /// `.env` file first if present. Unset variables keep their defaults.
    ///
    /// Every field has a key: `DAILY_LIMIT`, `MAX_RETRIES`, `BASE_DELAY_MS`,
    /// `MAX_DELAY_SECS`, `RATE_LIMIT_JITTER`, `RETRY_PERMANENT`,
    /// `MAX_CONCURRENCY`, `EXHAUSTION` (`skip` or `reassign`),
    /// `BATCH_SIZE`, `BATCH_PAUSE_MS`, `BROADCAST_CAPACITY`, `FALLBACK_TEXT`,
    /// `CREDENTIALS_DIR`, `CREDENTIAL_EXTENSION`, `JOB_LIST_DIR`, `CONTENT_DIR`,
    /// `SUCCESS_LOG` and `ERROR_LOG`. Setting either batch key enables
    /// batching, with the default for the other.
    ///
    /// # Errors
    ///
    /// Returns parse or validation failures as text.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary `DISPATCH_*` key lookup.
    ///
    /// # Errors
    ///
    /// Returns parse or validation failures as text.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = parsed(&lookup, "DISPATCH_DAILY_LIMIT")? {
            cfg.daily_limit = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_MAX_RETRIES")? {
            cfg.max_retries = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_BASE_DELAY_MS")? {
            cfg.base_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_MAX_DELAY_SECS")? {
            cfg.max_delay_secs = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_MAX_CONCURRENCY")? {
            cfg.max_concurrency = Some(v);
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_RETRY_PERMANENT")? {
            cfg.retry_permanent = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_RATE_LIMIT_JITTER")? {
            cfg.rate_limit_jitter = v;
        }
        if let Some(v) = parsed(&lookup, "DISPATCH_BROADCAST_CAPACITY")? {
            cfg.broadcast_capacity = v;
        }
        let batch_size: Option<usize> = parsed(&lookup, "DISPATCH_BATCH_SIZE")?;
        let batch_pause: Option<u64> = parsed(&lookup, "DISPATCH_BATCH_PAUSE_MS")?;
        if batch_size.is_some() || batch_pause.is_some() {
            let mut batch = cfg.batch.take().unwrap_or_default();
            if let Some(size) = batch_size {
                batch.size = size;
            }
            if let Some(pause_ms) = batch_pause {
                batch.pause_ms = pause_ms;
            }
            cfg.batch = Some(batch);
        }
        if let Some(v) = lookup("DISPATCH_FALLBACK_TEXT") {
            cfg.fallback_text = v;
        }
        if let Some(v) = lookup("DISPATCH_CREDENTIAL_EXTENSION") {
            cfg.credential_extension = v.trim().trim_start_matches('.').to_owned();
        }
        if let Some(v) = lookup("DISPATCH_EXHAUSTION") {
            cfg.exhaustion = match v.as_str() {
                "skip" => ExhaustionPolicy::Skip,
                "reassign" => ExhaustionPolicy::Reassign,
                other => return Err(format!("DISPATCH_EXHAUSTION: unknown policy `{other}`")),
            };
        }
        if let Some(v) = lookup("DISPATCH_CREDENTIALS_DIR") {
            cfg.credentials_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISPATCH_CONTENT_DIR") {
            cfg.content_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISPATCH_JOB_LIST_DIR") {
            cfg.job_list_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISPATCH_SUCCESS_LOG") {
            cfg.success_log = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISPATCH_ERROR_LOG") {
            cfg.error_log = PathBuf::from(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Retry policy derived from this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            rate_limit_jitter: self.rate_limit_jitter,
            retry_permanent: self.retry_permanent,
        }
    }

    /// Concurrency bound for a pool of `credentials` members.
    #[must_use]
    pub fn concurrency_for(&self, credentials: usize) -> usize {
        self.max_concurrency.unwrap_or(credentials).max(1)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| format!("{key}: {e}")))
        .transpose()
}
