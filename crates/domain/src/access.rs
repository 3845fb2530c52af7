//! Access control: verified identities checked against required roles.
//!
//! Credential verification itself belongs to an external identity provider,
//! reached through [`IdentityVerifier`]. This module only decides what a
//! verified email may do, based on the role stored in the [`Directory`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Email;
use document_store::DocumentStore;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};
use crate::user::{Directory, Role, User};

/// Errors reported by an identity provider.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    /// The credential is unknown, expired or malformed.
    #[error("invalid credential")]
    InvalidCredential,

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Trait for identity providers that turn a bearer credential into an email.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies a credential and returns the subject's email.
    async fn verify(&self, credential: &str) -> std::result::Result<Email, VerificationError>;
}

/// In-memory identity provider with a fixed table of credentials.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityVerifier {
    tokens: Arc<RwLock<HashMap<String, Email>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryIdentityVerifier {
    /// Creates a verifier that accepts no credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a verifier seeded with `(credential, email)` pairs.
    pub fn with_tokens(tokens: impl IntoIterator<Item = (String, Email)>) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(tokens.into_iter().collect())),
            unavailable: Arc::default(),
        }
    }

    /// Accepts `credential` as proof of `email` from now on.
    pub async fn issue(&self, credential: impl Into<String>, email: Email) {
        self.tokens.write().await.insert(credential.into(), email);
    }

    /// Stops accepting `credential`.
    pub async fn revoke(&self, credential: &str) {
        self.tokens.write().await.remove(credential);
    }

    /// Simulates a provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityVerifier for InMemoryIdentityVerifier {
    async fn verify(&self, credential: &str) -> std::result::Result<Email, VerificationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VerificationError::Unavailable(
                "identity provider is down".to_string(),
            ));
        }
        self.tokens
            .read()
            .await
            .get(credential)
            .cloned()
            .ok_or(VerificationError::InvalidCredential)
    }
}

/// An authenticated caller with a registered user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: Email,
    pub name: String,
    pub role: Role,
}

impl Caller {
    pub fn new(email: Email, name: impl Into<String>, role: Role) -> Self {
        Self {
            email,
            name: name.into(),
            role,
        }
    }

    /// Fails with `Forbidden` unless the caller's role satisfies `required`.
    pub fn require(&self, required: &[Role]) -> Result<()> {
        if self.role.satisfies(required) {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!(
                "role '{}' may not perform this operation",
                self.role
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<User> for Caller {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// Resolves bearer credentials into callers.
#[derive(Clone)]
pub struct AccessControl<S: DocumentStore> {
    verifier: Arc<dyn IdentityVerifier>,
    directory: Directory<S>,
}

impl<S: DocumentStore> AccessControl<S> {
    /// Creates access control over a verifier and a user directory.
    pub fn new(verifier: Arc<dyn IdentityVerifier>, directory: Directory<S>) -> Self {
        Self {
            verifier,
            directory,
        }
    }

    /// Verifies a credential without requiring a user record.
    ///
    /// Used by first-contact registration, before any record exists.
    pub async fn identify(&self, credential: Option<&str>) -> Result<Email> {
        let credential = credential
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DomainError::Unauthenticated("missing credential".to_string()))?;

        self.verifier
            .verify(credential)
            .await
            .map_err(|e| match e {
                VerificationError::InvalidCredential => {
                    DomainError::Unauthenticated("invalid credential".to_string())
                }
                VerificationError::Unavailable(detail) => DomainError::IdentityProvider(detail),
            })
    }

    /// Verifies a credential and loads the caller's user record.
    ///
    /// A verified identity without a user record is denied: it is
    /// authenticated but holds no role.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Caller> {
        let email = self.identify(credential).await?;
        match self.directory.find_by_email(&email).await? {
            Some(user) => Ok(user.into()),
            None => {
                tracing::warn!(%email, "verified identity has no user record");
                Err(DomainError::forbidden("no user record for this identity"))
            }
        }
    }

    /// Authenticates and checks the caller's role in one step.
    pub async fn authorize(&self, credential: Option<&str>, required: &[Role]) -> Result<Caller> {
        let caller = self.authenticate(credential).await?;
        caller.require(required)?;
        Ok(caller)
    }

    /// The directory backing role lookups.
    pub fn directory(&self) -> &Directory<S> {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;

    use super::*;
    use crate::user::Registration;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    async fn setup() -> (AccessControl<InMemoryDocumentStore>, InMemoryIdentityVerifier) {
        let verifier = InMemoryIdentityVerifier::new();
        verifier.issue("reader-token", email("reader@example.com")).await;
        verifier.issue("stranger-token", email("stranger@example.com")).await;

        let directory = Directory::new(InMemoryDocumentStore::new());
        directory
            .register(Registration::new(email("reader@example.com"), "Reader"))
            .await
            .unwrap();

        let access = AccessControl::new(Arc::new(verifier.clone()), directory);
        (access, verifier)
    }

    #[tokio::test]
    async fn test_missing_and_invalid_credentials_are_unauthenticated() {
        let (access, _) = setup().await;

        assert!(matches!(
            access.authenticate(None).await,
            Err(DomainError::Unauthenticated(_))
        ));
        assert!(matches!(
            access.authenticate(Some("")).await,
            Err(DomainError::Unauthenticated(_))
        ));
        assert!(matches!(
            access.authenticate(Some("forged")).await,
            Err(DomainError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_identity_is_forbidden() {
        let (access, _) = setup().await;

        assert!(matches!(
            access.authenticate(Some("stranger-token")).await,
            Err(DomainError::Forbidden(_))
        ));
        // Identification alone still succeeds
        assert_eq!(
            access.identify(Some("stranger-token")).await.unwrap(),
            email("stranger@example.com")
        );
    }

    #[tokio::test]
    async fn test_role_mismatch_is_forbidden() {
        let (access, _) = setup().await;

        let caller = access
            .authorize(Some("reader-token"), Role::USER)
            .await
            .unwrap();
        assert_eq!(caller.role, Role::User);

        assert!(matches!(
            access.authorize(Some("reader-token"), Role::LIBRARIAN).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_outage_is_distinct() {
        let (access, verifier) = setup().await;
        verifier.set_unavailable(true);

        assert!(matches!(
            access.authenticate(Some("reader-token")).await,
            Err(DomainError::IdentityProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_credential_is_rejected() {
        let (access, verifier) = setup().await;
        verifier.revoke("reader-token").await;

        assert!(matches!(
            access.authenticate(Some("reader-token")).await,
            Err(DomainError::Unauthenticated(_))
        ));
    }
}
