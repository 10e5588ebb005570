use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_types::api::{UpdateUsernameRequest, UserResponse, UserSearchQuery};
use parlor_types::validate::validate_username;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::photo::check_photo;
use crate::{AppState, blocking, convert};

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |db| db.get_user_by_id(&auth.id)).await?;
    Ok(Json(convert::user(user)))
}

/// PUT /me/username
pub async fn update_username(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateUsernameRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_username(&req.username)?;

    let user = blocking(&state, move |db| {
        db.update_username(&auth.id, &req.username)?;
        db.get_user_by_id(&auth.id)
    })
    .await?;

    Ok(Json(convert::user(user)))
}

/// PUT /me/photo, raw image bytes.
pub async fn update_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_photo(&bytes)?;

    let size = bytes.len();
    let user_id = auth.id.clone();
    blocking(&state, move |db| db.update_user_photo(&user_id, &bytes)).await?;

    info!(user_id = %auth.id, size, "Profile photo updated");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users?q=
pub async fn search_users(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthUser>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let q = query.q.trim().to_string();
    if q.is_empty() {
        return Err(ApiError::bad_request("search query is empty"));
    }

    let users = blocking(&state, move |db| db.search_users(&q)).await?;
    Ok(Json(users.into_iter().map(convert::user).collect()))
}
