//! Represents a registered account and the identity attached to a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;
const PASSWORD_MIN_LEN: usize = 4;
const PASSWORD_MAX_LEN: usize = 64;

/// A registered user.
///
/// Users are created at signup and never mutated afterwards.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct User {
    /// Server-assigned identifier.
    pub id: i64,

    /// Unique login name.
    pub username: String,

    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password: String,

    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, resolved by the auth middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// Raw signup / signin body.
#[derive(Deserialize, Debug)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Username + password pair that passed shape validation.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Validate the username and password shape.
    ///
    /// Usernames are 3-32 characters of ASCII letters, digits and `_`.
    /// Passwords are 4-64 characters.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, String> {
        let username = username.into();
        let password = password.into();

        let len = username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(format!(
                "username must be between {} and {} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err("username may only contain letters, digits and underscores".into());
        }

        let len = password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(format!(
                "password must be between {} and {} characters",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            ));
        }

        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl TryFrom<CredentialsRequest> for Credentials {
    type Error = String;

    fn try_from(req: CredentialsRequest) -> Result<Self, Self::Error> {
        Self::new(req.username, req.password)
    }
}
