use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validate::{check_length, finish, FieldErrors, Validate};
use crate::database::models::User;

/// POST /register body
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
}

impl Validate for UserCreate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "username", &self.username, 3, Some(50));
        check_length(&mut errors, "password", &self.password, 6, None);
        finish(errors)
    }
}

/// POST /login form (OAuth2 password flow field names)
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}
