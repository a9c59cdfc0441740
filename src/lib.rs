//! # Quota Dispatch
//!
//! A quota-aware bulk mail dispatch engine.
//!
//! A run takes a list of jobs (recipient, subject, HTML body), spreads them
//! round-robin over a shuffled pool of sender credentials, and delivers them
//! concurrently through a pluggable [`MailTransport`](core::MailTransport).
//! Every credential has a per-run send limit; a job whose credential has no
//! capacity left is recorded as skipped rather than attempted.
//!
//! ## Key Features
//!
//! - **Quota accounting**: capacity is reserved when a job is assigned, so
//!   successful sends never exceed a credential's limit, even under concurrency
//! - **Retry with backoff**: transient failures back off exponentially; rate
//!   limits add jitter or honour a server hint; permanent failures stop early
//! - **Progress stream**: every terminal outcome publishes a snapshot on a
//!   broadcast channel (`progress_update`)
//! - **Durable logs**: one record per job outcome, to files or memory
//! - **Cancellation**: a cancelled run still gives every job a status
//!
//! ```rust,ignore
//! use quota_dispatch::builders::build_dispatcher;
//! use quota_dispatch::config::DispatchConfig;
//! use quota_dispatch::infra::{load_job_list, DirContentResolver};
//! use quota_dispatch::runtime::TokioSpawner;
//!
//! let cfg = DispatchConfig::from_env()?;
//! let resolver = DirContentResolver::new(&cfg.content_dir);
//! let list = load_job_list(&cfg.job_list_dir, "emails.txt", &resolver)?;
//! let dispatcher = build_dispatcher(cfg, my_transport, TokioSpawner::current()?)?;
//!
//! let mut progress = dispatcher.subscribe();
//! let report = dispatcher.run(list.jobs).await?;
//! println!("{}% complete", report.snapshot.percent_complete);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core dispatch abstractions and quota accounting.
pub mod core;
/// Configuration models for limits, retries, and file locations.
pub mod config;
/// Builders to construct dispatchers from configuration.
pub mod builders;
/// Infrastructure adapters for credentials, recipient lists, and logs.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
