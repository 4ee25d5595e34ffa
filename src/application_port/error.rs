use crate::domain_port::{DeliveryError, StoreError};
use tracing::{debug, warn};

/// Errors surfaced by every public operation of the crate.
///
/// Token and link rejections of any kind collapse into `InvalidOrExpired` so
/// callers cannot tell which check failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid or expired credential")]
    InvalidOrExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many failed attempts")]
    TooManyAttempts,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("revocation store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// The specific reason a presented token was refused. Internal only.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
    #[error("token not found or already consumed")]
    NotFound,
    #[error("stored owner does not match token subject")]
    OwnerMismatch,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Store(e) => e.into(),
            CredentialError::Internal(e) => AuthError::InternalError(e),
            reason => {
                debug!(%reason, "credential rejected");
                AuthError::InvalidOrExpired
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        warn!(error = %err, "revocation store failure");
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl From<DeliveryError> for AuthError {
    fn from(err: DeliveryError) -> Self {
        AuthError::DeliveryFailed(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_rejections_are_indistinguishable() {
        let reasons = [
            CredentialError::Malformed,
            CredentialError::InvalidSignature,
            CredentialError::Expired,
            CredentialError::WrongKind,
            CredentialError::NotFound,
            CredentialError::OwnerMismatch,
        ];
        for reason in reasons {
            assert!(matches!(AuthError::from(reason), AuthError::InvalidOrExpired));
        }
    }

    #[test]
    fn store_failures_stay_distinct() {
        let err = CredentialError::Store(StoreError::Timeout(Duration::from_millis(250)));
        assert!(matches!(AuthError::from(err), AuthError::StoreUnavailable(_)));
    }
}
