//! Access gate for the tracker endpoint.
//!
//! Three independent credentials are checked, each by its own function:
//! - the end-user shared password handed to every map client,
//! - the administrator password that gates device creation,
//! - an optional service account for server-to-server callers using
//!   HTTP Basic authentication.
//!
//! The service account is configured separately from the credentials used
//! to talk to the tracking platform. Secrets are kept only as SHA-256
//! digests and compared in constant time.

use shared::crypto::{sha256_digest, verify_secret, SecretDigest};

use crate::error::DomainError;

/// Message returned when the administrator password is missing or wrong.
pub const INVALID_ADMIN_PASSWORD_MESSAGE: &str = "Forbidden - Invalid admin password";

#[derive(Clone)]
struct ServiceAccount {
    username: SecretDigest,
    password: SecretDigest,
}

/// Hashed credentials checked before any tracker operation.
#[derive(Clone, Default)]
pub struct AccessGate {
    user: Option<SecretDigest>,
    admin: Option<SecretDigest>,
    service: Option<ServiceAccount>,
}

/// Digest of a configured secret; an empty secret disables the credential.
fn configured(secret: &str) -> Option<SecretDigest> {
    if secret.is_empty() {
        None
    } else {
        Some(sha256_digest(secret))
    }
}

impl AccessGate {
    /// Create a gate from the end-user and administrator passwords.
    pub fn new(user_password: &str, admin_password: &str) -> Self {
        Self {
            user: configured(user_password),
            admin: configured(admin_password),
            service: None,
        }
    }

    /// Enable HTTP Basic authentication for a server-to-server account.
    ///
    /// Ignored unless both username and password are non-empty.
    pub fn with_service_account(mut self, username: &str, password: &str) -> Self {
        self.service = match (configured(username), configured(password)) {
            (Some(username), Some(password)) => Some(ServiceAccount { username, password }),
            _ => None,
        };
        self
    }

    /// Checks the end-user shared password.
    pub fn authorize_user(&self, presented: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|expected| verify_secret(presented, expected))
    }

    /// Checks the administrator password.
    pub fn authorize_admin(&self, presented: &str) -> bool {
        self.admin
            .as_ref()
            .is_some_and(|expected| verify_secret(presented, expected))
    }

    /// Requires the administrator password for a privileged operation.
    pub fn require_admin(&self, presented: &str) -> Result<(), DomainError> {
        if self.authorize_admin(presented) {
            Ok(())
        } else {
            Err(DomainError::AuthorizationFailure(
                INVALID_ADMIN_PASSWORD_MESSAGE.to_string(),
            ))
        }
    }

    /// Checks service account credentials from an HTTP Basic header.
    pub fn authorize_service(&self, username: &str, password: &str) -> bool {
        match &self.service {
            Some(account) => {
                // Both halves are always compared
                let username_ok = verify_secret(username, &account.username);
                let password_ok = verify_secret(password, &account.password);
                username_ok & password_ok
            }
            None => false,
        }
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin.is_some()
    }

    pub fn service_enabled(&self) -> bool {
        self.service.is_some()
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("user", &self.user.is_some())
            .field("admin", &self.admin.is_some())
            .field("service", &self.service.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_user() {
        let gate = AccessGate::new("map-secret", "admin-secret");
        assert!(gate.authorize_user("map-secret"));
        assert!(!gate.authorize_user("map-secre"));
        assert!(!gate.authorize_user("admin-secret"));
    }

    #[test]
    fn test_authorize_admin_is_independent() {
        let gate = AccessGate::new("map-secret", "admin-secret");
        assert!(gate.authorize_admin("admin-secret"));
        assert!(!gate.authorize_admin("map-secret"));
    }

    #[test]
    fn test_empty_credential_always_fails() {
        let gate = AccessGate::new("map-secret", "admin-secret");
        assert!(!gate.authorize_user(""));
        assert!(!gate.authorize_admin(""));

        let unconfigured = AccessGate::new("", "");
        assert!(!unconfigured.authorize_user(""));
        assert!(!unconfigured.authorize_admin(""));
        assert!(!unconfigured.authorize_user("anything"));
    }

    #[test]
    fn test_require_admin() {
        let gate = AccessGate::new("map-secret", "admin-secret");
        assert!(gate.require_admin("admin-secret").is_ok());

        match gate.require_admin("map-secret") {
            Err(DomainError::AuthorizationFailure(msg)) => {
                assert_eq!(msg, INVALID_ADMIN_PASSWORD_MESSAGE)
            }
            other => panic!("expected authorization failure, got {:?}", other),
        }
        assert!(AccessGate::new("map-secret", "").require_admin("").is_err());
    }

    #[test]
    fn test_admin_disabled_when_unset() {
        let gate = AccessGate::new("map-secret", "");
        assert!(!gate.admin_enabled());
        assert!(!gate.authorize_admin("map-secret"));
    }

    #[test]
    fn test_service_account() {
        let gate = AccessGate::new("map-secret", "").with_service_account("dispatch", "s2s-pass");
        assert!(gate.service_enabled());
        assert!(gate.authorize_service("dispatch", "s2s-pass"));
        assert!(!gate.authorize_service("dispatch", "wrong"));
        assert!(!gate.authorize_service("other", "s2s-pass"));
        assert!(!gate.authorize_service("", ""));
        // The service account does not open the user gate
        assert!(!gate.authorize_user("s2s-pass"));
    }

    #[test]
    fn test_service_account_requires_both_halves() {
        let gate = AccessGate::new("map-secret", "").with_service_account("dispatch", "");
        assert!(!gate.service_enabled());
        assert!(!gate.authorize_service("dispatch", ""));
    }

    #[test]
    fn test_debug_hides_digests() {
        let gate = AccessGate::new("map-secret", "admin-secret");
        let debug = format!("{:?}", gate);
        assert!(!debug.contains("map-secret"));
        assert!(debug.contains("user: true"));
    }
}
