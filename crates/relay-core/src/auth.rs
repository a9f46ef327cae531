//! Credential checking for incoming connections.

use crate::connection::BrokerId;
use std::collections::HashSet;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The credential is missing or not on the allow-list.
    #[error("credential not recognized")]
    Unauthorized,
}

/// Static allow-list authenticator.
///
/// A credential is valid only if it exactly matches an allow-list entry
/// (case-sensitive). No rate limiting, no revocation; the allow-list is
/// fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Authenticator {
    allowed: HashSet<String>,
}

impl Authenticator {
    /// Create an authenticator from the allowed credentials.
    #[must_use]
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Map a connection request's credential to a broker identity.
    ///
    /// Side-effect-free. Callers must refuse the connection before any
    /// handle or session is created, so a failed check leaks no state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] if the credential is absent or
    /// not on the allow-list.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<BrokerId, AuthError> {
        match credential {
            Some(c) if self.allowed.contains(c) => Ok(BrokerId::new(c)),
            _ => Err(AuthError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(["broker1", "broker2"])
    }

    #[test]
    fn test_known_credential() {
        let id = authenticator().authenticate(Some("broker1")).unwrap();
        assert_eq!(id.as_str(), "broker1");
    }

    #[test]
    fn test_unknown_credential() {
        assert_eq!(
            authenticator().authenticate(Some("intruder")),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            authenticator().authenticate(None),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(
            authenticator().authenticate(Some("Broker1")),
            Err(AuthError::Unauthorized)
        );
    }
}
