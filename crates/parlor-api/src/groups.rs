use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_db::models::ConversationSummary;
use parlor_db::{Database, DbError, DbResult};
use parlor_types::api::{
    AddMemberRequest, ConversationResponse, CreateGroupRequest, UpdateGroupNameRequest,
};
use parlor_types::models::ConversationKind;
use parlor_types::validate::{MAX_GROUP_MEMBERS, ValidationError, validate_group_name};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::photo::{check_photo, decode_base64};
use crate::{AppState, blocking, convert};

/// A group the caller belongs to. Direct conversations are not groups.
fn member_group(db: &Database, group_id: &str, user_id: &str) -> DbResult<ConversationSummary> {
    let summary = db.get_conversation(user_id, group_id)?;
    if summary.kind != ConversationKind::Group {
        return Err(DbError::not_found("group"));
    }
    Ok(summary)
}

/// GET /groups
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let groups = blocking(&state, move |db| db.get_my_groups(&auth.id)).await?;
    Ok(Json(
        groups
            .into_iter()
            .map(|g| convert::conversation(g, None))
            .collect(),
    ))
}

/// POST /groups. The creator is always a member.
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_group_name(&req.name)?;
    if req.members.len() > MAX_GROUP_MEMBERS {
        return Err(ValidationError::TooManyMembers.into());
    }
    let photo = match req.photo.as_deref() {
        Some(encoded) => {
            let bytes = decode_base64("photo", encoded)?;
            check_photo(&bytes)?;
            Some(bytes)
        }
        None => None,
    };

    let group = blocking(&state, move |db| {
        db.create_group(&req.name, &req.members, photo.as_deref(), &auth.id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::conversation(group, None))))
}

/// POST /groups/{id}/members
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let group = blocking(&state, move |db| {
        member_group(db, &group_id, &auth.id)?;
        db.add_member(&group_id, &req.user_id)?;
        db.get_conversation(&auth.id, &group_id)
    })
    .await?;

    Ok(Json(convert::conversation(group, None)))
}

/// DELETE /groups/{id}/members/me
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.id.clone();
    let gid = group_id.clone();
    blocking(&state, move |db| {
        member_group(db, &gid, &user_id)?;
        db.remove_member(&gid, &user_id)
    })
    .await?;

    info!(group_id = %group_id, user_id = %auth.id, "Left group");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /groups/{id}/name
pub async fn update_name(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupNameRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    validate_group_name(&req.name)?;

    let group = blocking(&state, move |db| {
        member_group(db, &group_id, &auth.id)?;
        db.update_group_name(&group_id, &req.name)?;
        db.get_conversation(&auth.id, &group_id)
    })
    .await?;

    Ok(Json(convert::conversation(group, None)))
}

/// PUT /groups/{id}/photo, raw image bytes.
pub async fn update_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_photo(&bytes)?;

    blocking(&state, move |db| {
        member_group(db, &group_id, &auth.id)?;
        db.update_group_photo(&group_id, &bytes)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
