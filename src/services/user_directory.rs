//! In-memory account store.
//!
//! Passwords are kept as salted SHA-256 digests (the user id is the salt) and
//! compared in constant time. Emails are matched case-insensitively.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{User, UserRole};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_NAME_LENGTH: usize = 2;

pub const DEMO_USER_ID: &str = "user_1";
pub const DEMO_USER_EMAIL: &str = "demo@fraudguard.com";
pub const DEMO_USER_PASSWORD: &str = "demo123";
pub const DEMO_ADMIN_ID: &str = "user_admin";
pub const DEMO_ADMIN_EMAIL: &str = "admin@fraudguard.com";
pub const DEMO_ADMIN_PASSWORD: &str = "admin12345";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user with email {0} already exists")]
    EmailTaken(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("{0}")]
    Validation(String),
}

#[derive(Default)]
struct DirectoryInner {
    users: HashMap<String, User>,
    by_email: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct UserDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the demo customer and the demo admin.
    pub async fn with_demo_users() -> Self {
        let directory = Self::new();
        directory
            .insert(DEMO_USER_ID, "Demo User", DEMO_USER_EMAIL, DEMO_USER_PASSWORD, UserRole::Customer)
            .await;
        directory
            .insert(DEMO_ADMIN_ID, "Risk Admin", DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, UserRole::Admin)
            .await;
        info!("Seeded demo users {} and {}", DEMO_USER_EMAIL, DEMO_ADMIN_EMAIL);
        directory
    }

    /// Insert without validation. Used for seeding; replaces any user with the same id.
    pub async fn insert(&self, id: &str, name: &str, email: &str, password: &str, role: UserRole) -> User {
        let user = User {
            id: id.to_string(),
            name: name.to_string(),
            email: normalize_email(email),
            password_digest: password_digest(id, password),
            role,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.by_email.insert(user.email.clone(), user.id.clone());
        inner.users.insert(user.id.clone(), user.clone());
        user
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, DirectoryError> {
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;

        let email = normalize_email(email);
        let id = format!("user_{}", Uuid::new_v4().simple());
        let user = User {
            id: id.clone(),
            name: name.trim().to_string(),
            email: email.clone(),
            password_digest: password_digest(&id, password),
            role: UserRole::Customer,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&email) {
            return Err(DirectoryError::EmailTaken(email));
        }
        inner.by_email.insert(email, id.clone());
        inner.users.insert(id, user.clone());

        info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, DirectoryError> {
        let inner = self.inner.read().await;
        let user = inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .ok_or(DirectoryError::InvalidCredentials)?;

        if !digest_matches(&user.password_digest, &password_digest(&user.id, password)) {
            warn!("Failed login for user {}", user.id);
            return Err(DirectoryError::InvalidCredentials);
        }
        Ok(user.clone())
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.inner.read().await.users.get(user_id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let inner = self.inner.read().await;
        inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .cloned()
    }

    pub async fn update_profile(&self, user_id: &str, name: &str, email: &str) -> Result<User, DirectoryError> {
        validate_name(name)?;
        validate_email(email)?;
        let email = normalize_email(email);

        let mut inner = self.inner.write().await;
        if let Some(owner) = inner.by_email.get(&email) {
            if owner != user_id {
                return Err(DirectoryError::EmailTaken(email));
            }
        }

        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        let previous_email = std::mem::replace(&mut user.email, email.clone());
        user.name = name.trim().to_string();
        let updated = user.clone();

        inner.by_email.remove(&previous_email);
        inner.by_email.insert(email, user_id.to_string());
        Ok(updated)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), DirectoryError> {
        if current_password.is_empty() {
            return Err(DirectoryError::Validation("Current password is required".to_string()));
        }
        validate_password(new_password)?;

        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;

        if !digest_matches(&user.password_digest, &password_digest(user_id, current_password)) {
            return Err(DirectoryError::InvalidCredentials);
        }
        user.password_digest = password_digest(user_id, new_password);
        info!("Password changed for user {}", user_id);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.users.is_empty()
    }
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn digest_matches(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), DirectoryError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DirectoryError::Validation("Invalid email address".to_string()))
    }
}

fn validate_name(name: &str) -> Result<(), DirectoryError> {
    if name.trim().chars().count() < MIN_NAME_LENGTH {
        return Err(DirectoryError::Validation(format!(
            "Name must be at least {} characters",
            MIN_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), DirectoryError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DirectoryError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_users_authenticate() {
        let directory = UserDirectory::with_demo_users().await;

        let demo = directory.authenticate(DEMO_USER_EMAIL, DEMO_USER_PASSWORD).await.unwrap();
        assert_eq!(demo.id, DEMO_USER_ID);
        assert_eq!(demo.role, UserRole::Customer);

        let admin = directory.authenticate("Admin@FraudGuard.com", DEMO_ADMIN_PASSWORD).await.unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let directory = UserDirectory::with_demo_users().await;
        assert_eq!(
            directory.authenticate(DEMO_USER_EMAIL, "nope").await.unwrap_err(),
            DirectoryError::InvalidCredentials
        );
        assert_eq!(
            directory.authenticate("ghost@fraudguard.com", "nope").await.unwrap_err(),
            DirectoryError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn test_register_and_duplicate_email() {
        let directory = UserDirectory::with_demo_users().await;
        let user = directory
            .register("Jane Doe", "jane@example.com", "longenough")
            .await
            .unwrap();
        assert!(user.id.starts_with("user_"));
        assert_eq!(user.role, UserRole::Customer);
        assert_ne!(user.password_digest, "longenough");

        let err = directory
            .register("Jane Again", "JANE@example.com", "longenough")
            .await
            .unwrap_err();
        assert_eq!(err, DirectoryError::EmailTaken("jane@example.com".to_string()));
        assert_eq!(directory.len().await, 3);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let directory = UserDirectory::new();
        assert!(matches!(
            directory.register("J", "j@example.com", "longenough").await,
            Err(DirectoryError::Validation(_))
        ));
        assert!(matches!(
            directory.register("Jane", "not-an-email", "longenough").await,
            Err(DirectoryError::Validation(_))
        ));
        assert!(matches!(
            directory.register("Jane", "j@example.com", "short").await,
            Err(DirectoryError::Validation(_))
        ));
        assert!(directory.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_profile_moves_email_index() {
        let directory = UserDirectory::with_demo_users().await;
        let updated = directory
            .update_profile(DEMO_USER_ID, "Demo Renamed", "renamed@fraudguard.com")
            .await
            .unwrap();
        assert_eq!(updated.name, "Demo Renamed");

        assert!(directory.find_by_email(DEMO_USER_EMAIL).await.is_none());
        assert!(directory
            .authenticate("renamed@fraudguard.com", DEMO_USER_PASSWORD)
            .await
            .is_ok());

        let taken = directory
            .update_profile(DEMO_USER_ID, "Demo", DEMO_ADMIN_EMAIL)
            .await
            .unwrap_err();
        assert!(matches!(taken, DirectoryError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let directory = UserDirectory::with_demo_users().await;
        assert_eq!(
            directory
                .change_password(DEMO_USER_ID, "wrong", "newpassword1")
                .await
                .unwrap_err(),
            DirectoryError::InvalidCredentials
        );

        directory
            .change_password(DEMO_USER_ID, DEMO_USER_PASSWORD, "newpassword1")
            .await
            .unwrap();
        assert!(directory.authenticate(DEMO_USER_EMAIL, DEMO_USER_PASSWORD).await.is_err());
        assert!(directory.authenticate(DEMO_USER_EMAIL, "newpassword1").await.is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("demo@fraudguard.com").is_ok());
        assert!(validate_email("demo@localhost").is_err());
        assert!(validate_email("@fraudguard.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }
}
