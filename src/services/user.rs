//! User service
//!
//! Implements business logic for accounts and authentication:
//! - Registration (the first account becomes staff)
//! - Login and logout with database-backed sessions
//! - Session validation for incoming requests

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Wrong username or password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username already registered
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    /// Create a new user service with a custom session lifetime
    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days: session_days.max(1),
        }
    }

    /// Register a new account.
    ///
    /// Input is expected to be validated by the registration form. The
    /// first account ever created is staff.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UsernameTaken(input.username));
        }

        let is_staff = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?
            == 0;
        let password_hash = hash_password(&input.password)?;
        let user = User::new(input.username, input.email, password_hash, is_staff);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!(user = %created.username, is_staff, "User registered");
                Ok(created)
            }
            // Lost a race against another registration with the same name
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UsernameTaken(user.username)),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Check credentials and open a new session
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, Session), UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to look up user")?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                tracing::warn!(username, "Failed login attempt");
                return Err(UserServiceError::InvalidCredentials);
            }
        };

        let session = self.start_session(&user).await?;
        tracing::info!(user = %user.username, "User logged in");
        Ok((user, session))
    }

    /// Open a session for an already authenticated user
    pub async fn start_session(&self, user: &User) -> Result<Session, UserServiceError> {
        let session = Session::new(user.id, self.session_days);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(session)
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token, if the session is still active
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = self
            .session_repo
            .get_active(token, Utc::now())
            .await
            .context("Failed to load session")?;

        match session {
            Some(session) => Ok(self
                .user_repo
                .get_by_id(session.user_id)
                .await
                .context("Failed to load session user")?),
            None => Ok(None),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Delete expired sessions, returning how many were removed
    pub async fn purge_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let removed = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to purge sessions")?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, sqlite_pool, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        (pool, UserService::with_session_days(user_repo, session_repo, 7))
    }

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "clave-segura-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_staff() {
        let (_pool, service) = setup_test_service().await;

        let first = service.register(input("ana")).await.expect("register");
        let second = service.register(input("beto")).await.expect("register");

        assert!(first.is_staff);
        assert!(!second.is_staff);
        assert_ne!(first.password_hash, "clave-segura-1");
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("ana")).await.expect("register");

        let result = service.register(input("ana")).await;
        assert!(matches!(result, Err(UserServiceError::UsernameTaken(name)) if name == "ana"));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("ana")).await.expect("register");

        let (user, session) = service
            .login("ana", "clave-segura-1")
            .await
            .expect("login");
        assert_eq!(session.user_id, user.id);
        let lifetime = session.expires_at - session.created_at;
        assert_eq!(lifetime.num_days(), 7);

        let current = service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .expect("active session");
        assert_eq!(current.username, "ana");

        service.logout(&session.id).await.expect("logout");
        assert!(service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("ana")).await.expect("register");

        assert!(matches!(
            service.login("ana", "otra-clave").await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nadie", "clave-segura-1").await,
            Err(UserServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_rejected_and_purged() {
        let (pool, service) = setup_test_service().await;
        service.register(input("ana")).await.expect("register");
        let (_user, session) = service
            .login("ana", "clave-segura-1")
            .await
            .expect("login");

        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(Utc::now() - chrono::Duration::hours(1))
            .bind(&session.id)
            .execute(sqlite_pool(&pool).expect("sqlite"))
            .await
            .expect("expire session");

        assert!(service
            .validate_session(&session.id)
            .await
            .expect("validate")
            .is_none());
        assert_eq!(service.purge_expired_sessions().await.expect("purge"), 1);
    }
}
