// src/identity.rs
use std::sync::Arc;

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::{info, warn};

use crate::config::AdminBootstrap;
use crate::error::AppError;
use crate::models::{NewUser, RegisterRequest, Role, User};
use crate::store::{Store, EMAIL_UNIQUE_CONSTRAINT, USERNAME_UNIQUE_CONSTRAINT};

const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against an argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub struct IdentityService {
    store: Arc<dyn Store>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        self.create(request, Role::User).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, AppError> {
        self.store
            .user_by_username(username)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.store.user_by_username(username.trim()).await? else {
            warn!("Login attempt for unknown user {username}");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!("Wrong password for {}", user.username);
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Creates the configured administrator unless the username is taken.
    pub async fn bootstrap_admin(&self, admin: &AdminBootstrap) -> Result<(), AppError> {
        if let Some(existing) = self.store.user_by_username(&admin.username).await? {
            if !existing.is_admin() {
                warn!(
                    "Bootstrap admin {} already exists without the ADMIN role",
                    existing.username
                );
            }
            return Ok(());
        }

        let request = RegisterRequest {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
        };
        let user = self.create(request, Role::Admin).await?;
        info!("Created administrator {}", user.username);
        Ok(())
    }

    async fn create(&self, request: RegisterRequest, role: Role) -> Result<User, AppError> {
        let username = request.username.trim();
        let email = request.email.trim();

        if username.is_empty() {
            return Err(AppError::Validation("username must not be blank".into()));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(AppError::Validation(format!(
                "username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }
        if email.is_empty() {
            return Err(AppError::Validation("email must not be blank".into()));
        }
        if !email.contains('@') {
            return Err(AppError::Validation("email is not valid".into()));
        }
        if request.password.trim().is_empty() {
            return Err(AppError::Validation("password must not be blank".into()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.store.email_taken(email).await? {
            return Err(AppError::Conflict("email is already in use".into()));
        }

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(&request.password)?,
            role,
        };

        // The store's unique indexes settle races between two registrations.
        let user = self.store.insert_user(new_user).await.map_err(|e| {
            if e.is_duplicate(USERNAME_UNIQUE_CONSTRAINT) {
                AppError::Conflict("username is already in use".into())
            } else if e.is_duplicate(EMAIL_UNIQUE_CONSTRAINT) {
                AppError::Conflict("email is already in use".into())
            } else {
                AppError::Storage(e)
            }
        })?;

        info!("Registered user {} ({})", user.username, user.role);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> IdentityService {
        IdentityService::new(Arc::new(MemoryStore::new()))
    }

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let identity = service();
        let user = identity
            .register(request("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "secret1");

        let found = identity.authenticate("alice", "secret1").await.unwrap();
        assert_eq!(found.id, user.id);

        let err = identity.authenticate("alice", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let err = identity.authenticate("nobody", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let identity = service();
        identity
            .register(request("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        let err = identity
            .register(request("Alice", "other@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("username")));

        let err = identity
            .register(request("alice2", "ALICE@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("email")));
    }

    #[tokio::test]
    async fn registration_fields_are_validated() {
        let identity = service();
        for (username, email, password) in [
            ("  ", "a@example.com", "secret1"),
            ("bob", "", "secret1"),
            ("bob", "not-an-email", "secret1"),
            ("bob", "bob@example.com", "   "),
            ("bob", "bob@example.com", "123"),
        ] {
            let err = identity
                .register(request(username, email, password))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{username}/{email}");
        }
    }

    #[tokio::test]
    async fn unknown_user_lookup_is_not_found() {
        let err = service().find_by_username("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let identity = service();
        let admin = AdminBootstrap {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "rootpass".to_string(),
        };

        identity.bootstrap_admin(&admin).await.unwrap();
        identity.bootstrap_admin(&admin).await.unwrap();

        let root = identity.find_by_username("root").await.unwrap();
        assert!(root.is_admin());
    }
}
