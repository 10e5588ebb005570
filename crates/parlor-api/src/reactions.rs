use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_types::api::{ReactionRequest, ReactionResponse};
use parlor_types::validate::validate_emoji;

use crate::error::ApiError;
use crate::messages::scoped_message;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, convert};

/// PUT /conversations/{id}/messages/{mid}/reaction. Replaces the caller's
/// previous reaction, if any.
pub async fn set_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<ReactionResponse>, ApiError> {
    validate_emoji(&req.emoji)?;

    let reaction = blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &message_id, &auth.id)?;
        db.add_reaction(&message_id, &auth.id, &req.emoji, &auth.username)
    })
    .await?;

    Ok(Json(convert::reaction(reaction)))
}

/// DELETE /conversations/{id}/messages/{mid}/reaction
pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &message_id, &auth.id)?;
        db.remove_reaction(&message_id, &auth.id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
