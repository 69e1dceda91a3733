//! Registration, login and token verification.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::db::models::{NewUser, User};
use crate::store::{RecordStore, StoreError};

pub mod jwt;
pub mod password;

pub use jwt::{Claims, Jwt};

pub type AuthResult<T> = core::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("username or email already registered")]
    Duplicate,

    #[error("{0}")]
    Validation(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Storage(StoreError),
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn RecordStore>,
    jwt: Jwt,
}

impl AuthService {
    pub fn new(store: Arc<dyn RecordStore>, jwt: Jwt) -> Self {
        Self { store, jwt }
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<User> {
        let username = username.trim();
        let email = email.trim();

        if username.len() < MIN_USERNAME_LEN {
            return Err(AuthError::Validation(format!(
                "username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if !looks_like_email(email) {
            return Err(AuthError::Validation("invalid email address".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = password::hash_password(password)?;
        match self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
        {
            Ok(user) => Ok(user),
            Err(StoreError::DuplicateUser) => Err(AuthError::Duplicate),
            Err(err) => Err(AuthError::Storage(err)),
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<(String, User)> {
        let user = match self.store.user_by_email(email.trim()).await {
            Ok(user) => user,
            // don't leak which of the two was wrong
            Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(AuthError::Storage(err)),
        };

        if !password::verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt.issue(user.id)?;
        Ok((token, user))
    }

    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        self.jwt.verify(token)
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemStore::new()), Jwt::new("test-secret", 1))
    }

    #[tokio::test]
    async fn register_then_login() {
        let auth = service();
        let user = auth
            .register("alice", "alice@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.level, 0);

        let (token, logged_in) = auth
            .login("alice@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(auth.verify_token(&token).unwrap().user_id(), user.id);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let auth = service();
        auth.register("bob", "bob@example.com", "longenoughpw")
            .await
            .unwrap();

        assert!(matches!(
            auth.login("bob@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "whatever").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn weak_inputs_are_rejected() {
        let auth = service();

        assert!(matches!(
            auth.register("ab", "a@b.com", "longenoughpw").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            auth.register("alice", "not-an-email", "longenoughpw").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            auth.register("alice", "a@b.com", "short").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let auth = service();
        auth.register("carol", "carol@example.com", "longenoughpw")
            .await
            .unwrap();

        assert!(matches!(
            auth.register("carol", "other@example.com", "longenoughpw")
                .await,
            Err(AuthError::Duplicate)
        ));
    }
}
