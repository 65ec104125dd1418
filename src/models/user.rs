//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
///
/// Staff users may author posts; everyone signed in may comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// May create posts and edit anyone's posts
    pub is_staff: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with an already hashed password.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(username: String, email: String, password_hash: String, is_staff: bool) -> Self {
        Self {
            id: 0,
            username,
            email,
            password_hash,
            is_staff,
            created_at: Utc::now(),
        }
    }

    /// Staff can edit any post; other users only their own.
    pub fn can_edit(&self, author_id: i64) -> bool {
        self.is_staff || self.id == author_id
    }
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
}
