use axum::{extract::State, Extension};
use tracing::info;

use crate::api::TagOut;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /tags - tags on at least one of the caller's notes, ordered by name
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<TagOut>> {
    info!("GET /tags - user={}", user.username);

    let tags = state.queries().tags_for_user(user.id).await?;
    Ok(ApiResponse::success(tags.into_iter().map(TagOut::from).collect()))
}
