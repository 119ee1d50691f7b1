use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;

const CREDENTIALS_REJECTED: &str = "Could not validate credentials";

/// Authenticated user context resolved from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// Bearer-token middleware for the protected routes.
///
/// The token must verify against the configured secret and its subject must
/// still name an existing account with the same id. Every failure collapses
/// into one 401 so callers cannot tell a bad signature from a deleted user.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(|msg| {
        debug!("Rejecting request to {}: {}", request.uri().path(), msg);
        ApiError::unauthorized(CREDENTIALS_REJECTED)
    })?;

    let claims = auth::validate_jwt(&token).map_err(|e| {
        debug!("Rejecting token: {}", e);
        ApiError::unauthorized(CREDENTIALS_REJECTED)
    })?;

    let user = state
        .users()
        .find_by_id(claims.user_id)
        .await?
        .filter(|user| user.username == claims.sub)
        .ok_or_else(|| {
            warn!("Token for user id {} no longer matches an account", claims.user_id);
            ApiError::unauthorized(CREDENTIALS_REJECTED)
        })?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    let (scheme, token) = auth_str
        .split_once(' ')
        .ok_or_else(|| "Authorization header must use Bearer token format".to_string())?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err("Authorization header must use Bearer token format".to_string());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err("Empty JWT token".to_string());
    }
    Ok(token.to_string())
}
