use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use parlor_db::{Database, DbError, DbResult};
use parlor_types::api::{ConversationResponse, DirectConversationRequest, UserResponse};
use tracing::debug;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, convert};

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let summaries = blocking(&state, move |db| db.get_my_conversations(&auth.id)).await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|s| convert::conversation(s, None))
            .collect(),
    ))
}

enum Peer {
    Id(String),
    Username(String),
}

/// POST /direct-conversations. The peer is named by id or by username.
pub async fn ensure_direct(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<DirectConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let peer = match (req.peer_id, req.peer_username) {
        (Some(id), None) => Peer::Id(id),
        (None, Some(name)) => Peer::Username(name),
        _ => return Err(ApiError::bad_request("give exactly one of peerId or peerUsername")),
    };

    let summary = blocking(&state, move |db| {
        let peer_id = match peer {
            Peer::Id(id) => id,
            Peer::Username(name) => db.get_user_by_name(&name)?.id,
        };
        db.ensure_direct_conversation(&auth.id, &peer_id)
    })
    .await?;

    Ok(Json(convert::conversation(summary, None)))
}

/// GET /conversations/{id}
///
/// Reads the conversation first, then records delivery of everything the
/// viewer was just shown. The response reflects the state before that write,
/// and a failed write fails the request.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let viewer = auth.id.clone();
    let (summary, messages) = blocking(&state, move |db| {
        let summary = db.get_conversation(&viewer, &conversation_id)?;
        let messages = db.list_messages(&summary.id)?;
        Ok((summary, messages))
    })
    .await?;

    let unseen: Vec<String> = messages
        .iter()
        .filter(|m| m.sender_id != auth.id)
        .map(|m| m.id.clone())
        .collect();
    if !unseen.is_empty() {
        let viewer = auth.id.clone();
        let marked = blocking(&state, move |db| db.mark_delivered(&viewer, &unseen)).await?;
        debug!(viewer = %auth.id, marked, "Delivery recorded on view");
    }

    Ok(Json(convert::conversation(summary, Some(messages))))
}

/// GET /conversations/{id}/members
pub async fn get_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let members = blocking(&state, move |db| {
        require_member(db, &conversation_id, &auth.id)?;
        db.get_conversation_members(&conversation_id)
    })
    .await?;

    Ok(Json(members.into_iter().map(convert::user).collect()))
}

/// Conversation-scoped routes answer 404 to non-members.
pub(crate) fn require_member(
    db: &Database,
    conversation_id: &str,
    user_id: &str,
) -> DbResult<()> {
    if db.is_member(conversation_id, user_id)? {
        Ok(())
    } else {
        Err(DbError::not_found("conversation"))
    }
}
