//! Identity directory: user records and roles.

use chrono::{DateTime, Utc};
use common::{DocumentId, Email};
use document_store::{Document, DocumentStore, DocumentStoreError, DocumentStoreExt, Filter, Update};
use serde::{Deserialize, Serialize};

use crate::access::Caller;
use crate::error::{DomainError, Result};

/// A caller's role.
///
/// Roles are a closed set. `Admin` is accepted wherever `Librarian` is;
/// there is no other inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A reader who orders and reviews books.
    #[default]
    User,

    /// Manages the books they added.
    Librarian,

    /// Manages everything.
    Admin,
}

impl Role {
    /// Requirement for operations open to readers only.
    pub const USER: &'static [Role] = &[Role::User];

    /// Requirement for catalog management; admins pass too.
    pub const LIBRARIAN: &'static [Role] = &[Role::Librarian];

    /// Requirement for administrative operations.
    pub const ADMIN: &'static [Role] = &[Role::Admin];

    /// Requirement satisfied by any registered caller.
    pub const ANY: &'static [Role] = &[Role::User, Role::Librarian, Role::Admin];

    /// Returns true if this role is accepted by a requirement listing `required`.
    pub fn satisfies(self, required: &[Role]) -> bool {
        required.contains(&self) || (self == Role::Admin && required.contains(&Role::Librarian))
    }

    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(
                "role",
                format!("'{other}' is not one of user, librarian, admin"),
            )),
        }
    }
}

/// A registered account, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocumentId,
    pub email: Email,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The document key for the user with `email`.
    pub fn id_for(email: &Email) -> DocumentId {
        DocumentId::from_key(email.as_str())
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Profile data supplied on first contact.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: Email,
    pub name: String,
    pub auth_provider: Option<String>,
    pub photo_url: Option<String>,
}

impl Registration {
    pub fn new(email: Email, name: impl Into<String>) -> Self {
        Self {
            email,
            name: name.into(),
            auth_provider: None,
            photo_url: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_provider = Some(provider.into());
        self
    }
}

/// Service for user records.
#[derive(Clone)]
pub struct Directory<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> Directory<S> {
    /// Creates a new directory over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the user on first contact, or returns the existing record unchanged.
    ///
    /// The boolean is true when a new record was created. The user's
    /// document id is derived from the email, so two concurrent first
    /// contacts race on the store's primary key and only one insert wins.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<(User, bool)> {
        let name = registration.name.trim();
        let name = if name.is_empty() {
            registration.email.as_str().to_string()
        } else {
            name.to_string()
        };

        let user = User {
            id: User::id_for(&registration.email),
            email: registration.email,
            name,
            role: Role::User,
            auth_provider: registration.auth_provider,
            photo_url: registration.photo_url,
            created_at: Utc::now(),
        };

        match self.store.insert_document(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "user registered");
                Ok((user, true))
            }
            Err(DocumentStoreError::DuplicateKey { .. }) => {
                let existing = self
                    .find_by_email(&user.email)
                    .await?
                    .ok_or_else(|| DomainError::not_found("user", &user.email))?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Registers `email` if needed and makes it an admin.
    ///
    /// Run once at startup so a fresh deployment has someone who can
    /// assign roles. Not reachable over HTTP.
    #[tracing::instrument(skip(self))]
    pub async fn bootstrap_admin(&self, email: &Email) -> Result<User> {
        let (user, _) = self
            .register(Registration::new(email.clone(), email.as_str()))
            .await?;
        if user.role == Role::Admin {
            return Ok(user);
        }

        let promoted = self
            .store
            .update_document(
                user.id,
                &Filter::new(),
                &Update::new().set("role", Role::Admin.as_str()),
            )
            .await?
            .ok_or_else(|| DomainError::not_found("user", user.id))?;
        tracing::info!(user_id = %user.id, "bootstrap admin ensured");
        Ok(promoted)
    }

    /// Looks up a user by email.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<User>> {
        Ok(self.store.get_document(User::id_for(email)).await?)
    }

    /// Loads a user by id.
    pub async fn get(&self, id: DocumentId) -> Result<User> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }

    /// Lists every user. Admin only.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn list(&self, caller: &Caller) -> Result<Vec<User>> {
        caller.require(Role::ADMIN)?;
        Ok(self.store.find_documents(&Filter::new()).await?)
    }

    /// Changes a user's role. Admin only; never self-service.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.email))]
    pub async fn change_role(&self, caller: &Caller, id: DocumentId, role: Role) -> Result<User> {
        caller.require(Role::ADMIN)?;

        let updated = self
            .store
            .update_document(id, &Filter::new(), &Update::new().set("role", role.as_str()))
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))?;

        tracing::info!(user_id = %id, %role, "user role changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn caller(role: Role) -> Caller {
        Caller::new(email("caller@example.com"), "Caller", role)
    }

    #[test]
    fn test_role_satisfies_listed_roles() {
        assert!(Role::User.satisfies(Role::USER));
        assert!(Role::Librarian.satisfies(Role::LIBRARIAN));
        assert!(Role::Admin.satisfies(Role::ADMIN));
        assert!(Role::Admin.satisfies(Role::LIBRARIAN));

        assert!(!Role::User.satisfies(Role::LIBRARIAN));
        assert!(!Role::User.satisfies(Role::ADMIN));
        assert!(!Role::Librarian.satisfies(Role::ADMIN));
        assert!(!Role::Librarian.satisfies(Role::USER));
        assert!(!Role::Admin.satisfies(Role::USER));
    }

    #[test]
    fn test_role_satisfies_is_membership_plus_admin_for_librarian() {
        let all = [Role::User, Role::Librarian, Role::Admin];
        let requirements: [&[Role]; 5] = [Role::USER, Role::LIBRARIAN, Role::ADMIN, Role::ANY, &[]];
        for role in all {
            for required in requirements {
                let expected = required.contains(&role)
                    || (role == Role::Admin && required.contains(&Role::Librarian));
                assert_eq!(role.satisfies(required), expected, "{role} vs {required:?}");
            }
        }
    }

    #[test]
    fn test_role_parse_and_serialization() {
        assert_eq!("librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert_eq!(Role::default(), Role::User);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let directory = Directory::new(InMemoryDocumentStore::new());

        let (first, created) = directory
            .register(Registration::new(email("reader@example.com"), "Reader"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.role, Role::User);

        let (second, created) = directory
            .register(Registration::new(email("Reader@Example.com"), "Someone Else").with_provider("google"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_register_defaults_blank_name_to_email() {
        let directory = Directory::new(InMemoryDocumentStore::new());
        let (user, _) = directory
            .register(Registration::new(email("anon@example.com"), "  "))
            .await
            .unwrap();
        assert_eq!(user.name, "anon@example.com");
    }

    #[tokio::test]
    async fn test_change_role_requires_admin() {
        let directory = Directory::new(InMemoryDocumentStore::new());
        let (user, _) = directory
            .register(Registration::new(email("reader@example.com"), "Reader"))
            .await
            .unwrap();

        let denied = directory
            .change_role(&caller(Role::Librarian), user.id, Role::Admin)
            .await;
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));

        let updated = directory
            .change_role(&caller(Role::Admin), user.id, Role::Librarian)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Librarian);

        let missing = directory
            .change_role(&caller(Role::Admin), DocumentId::new(), Role::Admin)
            .await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_promotes_existing_user() {
        let directory = Directory::new(InMemoryDocumentStore::new());
        directory
            .register(Registration::new(email("boss@example.com"), "Boss"))
            .await
            .unwrap();

        let admin = directory.bootstrap_admin(&email("boss@example.com")).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.name, "Boss");

        let again = directory.bootstrap_admin(&email("boss@example.com")).await.unwrap();
        assert_eq!(again, admin);
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let directory = Directory::new(InMemoryDocumentStore::new());
        directory
            .register(Registration::new(email("a@example.com"), "A"))
            .await
            .unwrap();

        assert!(directory.list(&caller(Role::User)).await.is_err());
        assert_eq!(directory.list(&caller(Role::Admin)).await.unwrap().len(), 1);
    }
}
