//! Bearer Credentials
//!
//! Every external call in the pipeline carries a credential issued by the
//! auth collaborator. A missing or blank credential aborts the whole
//! operation before any network call is made.

use secrecy::{ExposeSecret, SecretString};

use crate::types::{FlowError, Result};

/// Bearer credential, redacted in debug output
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    /// Create a credential, rejecting blank tokens
    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FlowError::Auth("bearer token is empty".to_string()));
        }
        Ok(Self {
            token: SecretString::from(token),
        })
    }

    /// Value for an `Authorization` header
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// Fail-fast precondition shared by every entry point
pub fn require_credential(credential: Option<&Credential>) -> Result<&Credential> {
    credential.ok_or_else(|| FlowError::Auth("no credential supplied".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_rejected() {
        assert!(matches!(Credential::bearer("   "), Err(FlowError::Auth(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let cred = Credential::bearer("s3cret").unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("s3cret"));
        assert_eq!(cred.header_value(), "Bearer s3cret");
    }

    #[test]
    fn test_require_credential() {
        assert!(matches!(require_credential(None), Err(FlowError::Auth(_))));
        let cred = Credential::bearer("t").unwrap();
        assert!(require_credential(Some(&cred)).is_ok());
    }
}
