//! CredentialService: user accounts backed by SQLite, passwords stored as
//! salted argon2id hashes.

use crate::models::user::{Credentials, User};
use crate::services::is_unique_violation;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use chrono::Utc;
use rand_core::OsRng;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username `{0}` already exists")]
    UsernameTaken(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

#[derive(Clone)]
pub struct CredentialService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    hasher: Argon2<'static>,
}

impl CredentialService {
    pub fn new(db: Arc<SqlitePool>, hasher: Argon2<'static>) -> Self {
        Self { db, hasher }
    }

    /// Store a new user with a freshly salted hash of the password.
    ///
    /// Returns UsernameTaken when the UNIQUE constraint on `username` fires.
    pub async fn register(&self, credentials: &Credentials) -> CredentialResult<()> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher
            .hash_password(credentials.password().as_bytes(), &salt)
            .map_err(|err| CredentialError::Hash(err.to_string()))?
            .to_string();

        match sqlx::query("INSERT INTO users (username, password, created_at) VALUES (?, ?, ?)")
            .bind(credentials.username())
            .bind(&password_hash)
            .bind(Utc::now())
            .execute(&*self.db)
            .await
        {
            Ok(_) => {
                info!("registered user {}", credentials.username());
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Err(CredentialError::UsernameTaken(
                credentials.username().to_string(),
            )),
            Err(err) => Err(CredentialError::Sqlx(err)),
        }
    }

    /// True iff the user exists and the password matches its stored hash.
    ///
    /// Unknown users and wrong passwords are both `false`.
    pub async fn verify(&self, credentials: &Credentials) -> CredentialResult<bool> {
        let Some(user) = self.find_by_username(credentials.username()).await? else {
            debug!("sign-in for unknown user {}", credentials.username());
            return Ok(false);
        };

        let parsed = PasswordHash::new(&user.password)
            .map_err(|err| CredentialError::Hash(err.to_string()))?;

        match self
            .hasher
            .verify_password(credentials.password().as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => {
                debug!("password mismatch for user {}", user.username);
                Ok(false)
            }
            Err(err) => Err(CredentialError::Hash(err.to_string())),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> CredentialResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }
}
