// handlers/public/account.rs - POST /register and POST /login

use axum::extract::State;
use tracing::{info, warn};

use crate::api::{LoginForm, Token, UserCreate, UserOut};
use crate::auth;
use crate::error::ApiError;
use crate::middleware::{ApiForm, ApiJson, ApiResponse, ApiResult};
use crate::services::ServiceError;
use crate::state::AppState;
use crate::types::Operation;

/// POST /register - create an account
///
/// Input: `{"username": "...", "password": "..."}`. Answers 201 with the
/// public user view, 400 when the username is taken, 422 on bad lengths.
pub async fn register(State(state): State<AppState>, ApiJson(payload): ApiJson<UserCreate>) -> ApiResult<UserOut> {
    info!("POST /register - username={}", payload.username);

    let user = state.users().register(&payload).await?;
    Ok(ApiResponse::created(UserOut::from(user)))
}

/// POST /login - exchange form-encoded credentials for a bearer token
pub async fn login(State(state): State<AppState>, ApiForm(form): ApiForm<LoginForm>) -> ApiResult<Token> {
    info!("POST /login - username={}", form.username);

    let user = match state.users().authenticate(&form.username, &form.password).await {
        Ok(user) => user,
        Err(ServiceError::AuthenticationFailed) => {
            warn!("Failed login for username={}", form.username);
            return Err(ServiceError::AuthenticationFailed.into());
        }
        Err(e) => return Err(e.into()),
    };

    let token = auth::generate_jwt(&user.username, user.id).map_err(|source| {
        ApiError::from(ServiceError::Credential {
            operation: Operation::Login,
            source,
        })
    })?;

    Ok(ApiResponse::success(Token::bearer(token)))
}
