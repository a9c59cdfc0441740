//! Mail transport abstraction.

use async_trait::async_trait;

use crate::core::{ComposedMessage, SendError};
use crate::util::CredentialId;

/// Delivers one composed message using one sender credential.
///
/// Implementations own everything below the dispatcher: resolving the
/// credential to an authorized account handle, talking to the provider, and
/// mapping provider failures onto [`SendError`]. Transports that only see
/// error text can use [`SendError::classify`].
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use quota_dispatch::core::{ComposedMessage, MailTransport, SendError};
/// use quota_dispatch::util::CredentialId;
///
/// struct LoggingTransport;
///
/// #[async_trait]
/// impl MailTransport for LoggingTransport {
///     async fn send(
///         &self,
///         credential: &CredentialId,
///         message: &ComposedMessage,
///     ) -> Result<(), SendError> {
///         println!("{credential} -> {}", message.to);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    /// Attempt delivery of `message` using `credential`.
    ///
    /// # Errors
    ///
    /// Returns the typed failure for this attempt; the dispatcher decides
    /// whether to retry.
    async fn send(&self, credential: &CredentialId, message: &ComposedMessage)
        -> Result<(), SendError>;
}

#[async_trait]
impl<T> MailTransport for std::sync::Arc<T>
where
    T: MailTransport + ?Sized,
{
    async fn send(
        &self,
        credential: &CredentialId,
        message: &ComposedMessage,
    ) -> Result<(), SendError> {
        (**self).send(credential, message).await
    }
}
