// handlers/protected/notes.rs - /notes and /notes/:id
//
// A note owned by someone else answers exactly like a missing one.

use axum::{
    extract::{Query, State},
    Extension,
};
use tracing::info;

use crate::api::{NoteCreate, NoteFilter, NoteOut, NoteUpdate};
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /notes?search=&tag= - the caller's notes, most recently updated first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<NoteFilter>,
) -> ApiResult<Vec<NoteOut>> {
    info!(
        "GET /notes - user={} search={:?} tag={:?}",
        user.username,
        filter.search(),
        filter.tag()
    );

    let notes = state.queries().list(user.id, &filter).await?;
    Ok(ApiResponse::success(notes.into_iter().map(NoteOut::from).collect()))
}

/// POST /notes - 201 with the stored note and its tags
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<NoteCreate>,
) -> ApiResult<NoteOut> {
    info!("POST /notes - user={}", user.username);

    let note = state.notes().create(user.id, &payload).await?;
    Ok(ApiResponse::created(NoteOut::from(note)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(note_id): ApiPath<i64>,
) -> ApiResult<NoteOut> {
    info!("GET /notes/{} - user={}", note_id, user.username);

    let note = state.notes().get(user.id, note_id).await?;
    Ok(ApiResponse::success(NoteOut::from(note)))
}

/// PUT /notes/:id - partial update; absent fields are left alone and a
/// present `tags` list replaces the whole set
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(note_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<NoteUpdate>,
) -> ApiResult<NoteOut> {
    info!("PUT /notes/{} - user={}", note_id, user.username);

    let note = state.notes().update(user.id, note_id, &payload).await?;
    Ok(ApiResponse::success(NoteOut::from(note)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(note_id): ApiPath<i64>,
) -> ApiResult<()> {
    info!("DELETE /notes/{} - user={}", note_id, user.username);

    state.notes().delete(user.id, note_id).await?;
    Ok(ApiResponse::no_content())
}
