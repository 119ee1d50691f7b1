use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config;

/// Access token claims. `sub` carries the username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(username: String, user_id: i64, expire_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: username,
            user_id,
            exp: (now + Duration::minutes(expire_minutes)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
    PasswordHash(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            AuthError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            AuthError::InvalidSecret => write!(f, "Invalid JWT secret"),
            AuthError::PasswordHash(msg) => write!(f, "Password hashing error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Issue an access token for a user with the configured secret and lifetime.
pub fn generate_jwt(username: &str, user_id: i64) -> Result<String, AuthError> {
    let security = &config::config().security;
    let claims = Claims::new(username.to_string(), user_id, security.access_token_expire_minutes);
    encode_token(&claims, &security.secret_key)
}

/// Verify signature and expiry of an access token.
pub fn validate_jwt(token: &str) -> Result<Claims, AuthError> {
    decode_token(token, &config::config().security.secret_key)
}

/// bcrypt is CPU bound, so both helpers run off the async executor.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hashed = hashed.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Runs a full bcrypt verification against a throwaway hash so a login for
/// an unknown user costs the same as a wrong password. Always `false`.
pub async fn verify_dummy_password(password: &str) -> Result<bool, AuthError> {
    let hashed = DUMMY_HASH
        .get_or_try_init(|| hash_password("unused dummy credential"))
        .await?;
    verify_password(password, hashed).await?;
    Ok(false)
}
