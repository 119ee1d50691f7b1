// handlers/protected/account.rs - GET /me and DELETE /me

use axum::{extract::State, Extension};
use tracing::info;

use crate::api::UserOut;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ServiceError;
use crate::state::AppState;

/// GET /me - the authenticated account
pub async fn whoami(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<UserOut> {
    info!("GET /me - user={}", user.username);

    let account = state
        .users()
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;
    Ok(ApiResponse::success(UserOut::from(account)))
}

/// DELETE /me - remove the account together with its notes
pub async fn delete_account(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<()> {
    info!("DELETE /me - user={}", user.username);

    match state.users().delete(user.id).await {
        Ok(()) => Ok(ApiResponse::no_content()),
        // Removed between token check and delete
        Err(ServiceError::NotFound) => Err(ApiError::unauthorized("Could not validate credentials")),
        Err(e) => Err(e.into()),
    }
}
