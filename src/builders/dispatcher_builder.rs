//! Wire a [`Dispatcher`] from a [`DispatchConfig`].

use crate::config::DispatchConfig;
use crate::core::{DeliveryLog, DispatchError, Dispatcher, MailTransport, Spawn};
use crate::infra::{load_credential_sources, FileDeliveryLog};
use crate::util::CredentialId;

/// Build a dispatcher the way the service runs it: credentials listed from
/// `credentials_dir` and outcomes appended to the configured text logs.
///
/// # Errors
///
/// Returns configuration, credential discovery, or log-file errors.
pub fn build_dispatcher<T, S>(
    cfg: DispatchConfig,
    transport: T,
    spawner: S,
) -> Result<Dispatcher<T, S>, DispatchError>
where
    T: MailTransport,
    S: Spawn + Clone + Send + Sync + 'static,
{
    DispatcherBuilder::new(cfg).file_logs().build(transport, spawner)
}

/// Step-by-step dispatcher construction.
pub struct DispatcherBuilder {
    cfg: DispatchConfig,
    sources: Option<Vec<CredentialId>>,
    log: Option<Box<dyn DeliveryLog>>,
    file_logs: bool,
    seed: Option<u64>,
}

impl DispatcherBuilder {
    /// Start from `cfg`.
    #[must_use]
    pub fn new(cfg: DispatchConfig) -> Self {
        Self {
            cfg,
            sources: None,
            log: None,
            file_logs: false,
            seed: None,
        }
    }

    /// Use these credential sources instead of listing `credentials_dir`.
    #[must_use]
    pub fn sources(mut self, sources: Vec<CredentialId>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Record outcomes to `log`.
    #[must_use]
    pub fn delivery_log(mut self, log: Box<dyn DeliveryLog>) -> Self {
        self.log = Some(log);
        self.file_logs = false;
        self
    }

    /// Record outcomes to the configured success and error files.
    #[must_use]
    pub fn file_logs(mut self) -> Self {
        self.file_logs = true;
        self.log = None;
        self
    }

    /// Seed shuffling and jitter.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Finish construction.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] for a bad configuration,
    /// [`DispatchError::NoCredentials`] or [`DispatchError::Io`] when listing
    /// credentials fails, and [`DispatchError::Io`] when a log file cannot be
    /// opened.
    pub fn build<T, S>(self, transport: T, spawner: S) -> Result<Dispatcher<T, S>, DispatchError>
    where
        T: MailTransport,
        S: Spawn + Clone + Send + Sync + 'static,
    {
        self.cfg.validate().map_err(DispatchError::InvalidConfig)?;

        let sources = match self.sources {
            Some(sources) if sources.is_empty() => return Err(DispatchError::NoCredentials),
            Some(sources) => sources,
            None => load_credential_sources(&self.cfg.credentials_dir, &self.cfg.credential_extension)?,
        };

        let log: Option<Box<dyn DeliveryLog>> = if self.file_logs {
            Some(Box::new(FileDeliveryLog::open(
                &self.cfg.success_log,
                &self.cfg.error_log,
            )?))
        } else {
            self.log
        };

        let mut dispatcher = Dispatcher::new(self.cfg, sources, transport, spawner)?;
        if let Some(log) = log {
            dispatcher = dispatcher.with_delivery_log(log);
        }
        if let Some(seed) = self.seed {
            dispatcher = dispatcher.with_seed(seed);
        }
        Ok(dispatcher)
    }
}
