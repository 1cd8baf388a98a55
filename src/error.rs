//! Error taxonomy shared by the notification subsystem.

use thiserror::Error;

use crate::push::RegistrationState;

/// Errors surfaced by the delivery, push and store components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("Notifications are not supported on this platform")]
    UnsupportedPlatform,

    #[error("Notification permission was denied")]
    PermissionDenied,

    #[error("Operation not valid in state {state}")]
    NotReady { state: RegistrationState },

    #[error("Invalid relay key: {0}")]
    InvalidKey(String),

    #[error("Push subscription denied: {0}")]
    SubscriptionDenied(String),

    #[error("Background handler registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Remote write failed: {0}")]
    RemoteWriteFailed(String),

    #[error("Remote read failed: {0}")]
    RemoteReadFailed(String),

    #[error("Malformed push payload: {0}")]
    MalformedPayload(String),
}

impl NotifyError {
    /// Whether retrying the same call can succeed without a configuration change
    /// or a fresh user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifyError::SubscriptionDenied(_)
                | NotifyError::RemoteWriteFailed(_)
                | NotifyError::RemoteReadFailed(_)
        )
    }

    pub(crate) fn remote_read(err: anyhow::Error) -> Self {
        NotifyError::RemoteReadFailed(format!("{:#}", err))
    }

    pub(crate) fn remote_write(err: anyhow::Error) -> Self {
        NotifyError::RemoteWriteFailed(format!("{:#}", err))
    }
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(NotifyError::RemoteReadFailed("timeout".into()).is_retryable());
        assert!(NotifyError::RemoteWriteFailed("timeout".into()).is_retryable());
        assert!(NotifyError::SubscriptionDenied("revoked".into()).is_retryable());

        assert!(!NotifyError::UnsupportedPlatform.is_retryable());
        assert!(!NotifyError::PermissionDenied.is_retryable());
        assert!(!NotifyError::InvalidKey("bad".into()).is_retryable());
        assert!(!NotifyError::MalformedPayload("bad".into()).is_retryable());
        assert!(!NotifyError::NotReady {
            state: RegistrationState::Unregistered
        }
        .is_retryable());
    }

    #[test]
    fn test_remote_errors_keep_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("Failed to query notifications");
        match NotifyError::remote_read(err) {
            NotifyError::RemoteReadFailed(msg) => {
                assert_eq!(msg, "Failed to query notifications: connection reset")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
