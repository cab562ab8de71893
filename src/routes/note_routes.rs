use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::note_dto::{NoteCreateRequest, NoteResponse};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_or_update_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NoteCreateRequest>,
) -> Result<Json<NoteResponse>> {
    req.validate()?;
    let counsellor_id = claims.user_id()?;
    let note = state
        .note_service
        .upsert_note(
            counsellor_id,
            &claims.display_name(),
            req.test_attempt_id,
            &req.notes,
        )
        .await?;
    Ok(Json(note))
}

#[axum::debug_handler]
pub async fn get_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<Option<NoteResponse>>> {
    let requester_id = claims.user_id()?;
    let note = state
        .note_service
        .get_note(requester_id, claims.user_role(), attempt_id)
        .await?;
    Ok(Json(note))
}
