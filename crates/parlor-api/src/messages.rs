use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_db::models::MessageRow;
use parlor_db::{Database, DbError, DbResult};
use parlor_types::api::{
    ForwardMessageRequest, MarkStatusRequest, MessageResponse, ReceiptResponse, SendMessageRequest,
};
use parlor_types::models::{ContentKind, MessageContent};
use parlor_types::validate::{validate_attachment, validate_content};
use tracing::info;

use crate::conversations::require_member;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::photo::{check_photo, decode_base64};
use crate::{AppState, blocking, convert};

/// Loads a message for a member of `conversation_id`. A message that lives in
/// another conversation is reported as missing.
pub(crate) fn scoped_message(
    db: &Database,
    conversation_id: &str,
    message_id: &str,
    user_id: &str,
) -> DbResult<MessageRow> {
    require_member(db, conversation_id, user_id)?;
    let message = db.get_message(message_id)?;
    if message.conversation_id != conversation_id {
        return Err(DbError::not_found("message"));
    }
    Ok(message)
}

/// POST /conversations/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = match req.content_type {
        ContentKind::Text => MessageContent::text(req.content),
        ContentKind::Photo => {
            let bytes = decode_base64("content", &req.content)?;
            check_photo(&bytes)?;
            MessageContent::photo(bytes)
        }
    };
    validate_content(content.kind, &content.value)?;

    let attachment = req
        .attachment
        .as_deref()
        .map(|encoded| decode_base64("attachment", encoded))
        .transpose()?;
    if let Some(attachment) = &attachment {
        validate_attachment(attachment)?;
    }

    let message = blocking(&state, move |db| {
        require_member(db, &conversation_id, &auth.id)?;
        db.send_message(&conversation_id, &auth.id, &content, attachment.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::message(message))))
}

/// GET /conversations/{id}/messages/{mid}
pub async fn get_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &message_id, &auth.id)
    })
    .await?;
    Ok(Json(convert::message(message)))
}

/// DELETE /conversations/{id}/messages/{mid}. Only the sender may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |db| {
        require_member(db, &conversation_id, &auth.id)?;
        db.delete_message(&conversation_id, &message_id, &auth.id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /conversations/{id}/messages/{mid}/forward
///
/// The caller must belong to both the source and the target conversation.
pub async fn forward_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &message_id, &auth.id)?;
        require_member(db, &req.target_conversation_id, &auth.id)?;
        db.forward_message(&message_id, &req.target_conversation_id, &auth.id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::message(message))))
}

/// PUT /conversations/{id}/messages/{mid}/status
pub async fn mark_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    Json(req): Json<MarkStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = req.status;
    let user_id = auth.id.clone();
    let mid = message_id.clone();
    blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &mid, &user_id)?;
        db.mark_status(&mid, &user_id, status)
    })
    .await?;

    info!(message_id = %message_id, user_id = %auth.id, status = status.as_str(), "Status marked");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /conversations/{id}/messages/{mid}/receipts
pub async fn get_receipts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((conversation_id, message_id)): Path<(String, String)>,
) -> Result<Json<Vec<ReceiptResponse>>, ApiError> {
    let receipts = blocking(&state, move |db| {
        scoped_message(db, &conversation_id, &message_id, &auth.id)?;
        db.get_receipts(&message_id)
    })
    .await?;
    Ok(Json(receipts.into_iter().map(convert::receipt).collect()))
}
