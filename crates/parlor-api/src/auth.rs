use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use parlor_types::api::{Claims, LoginRequest, LoginResponse};
use parlor_types::validate::validate_username;
use tracing::info;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

/// POST /session. Logs in by username, creating the account on first use.
/// Answers 201 when the user was created, 200 otherwise.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;

    let (user, created) = blocking(&state, move |db| db.login(&req.username)).await?;

    let token = create_token(&state, &user.id, &user.username)?;
    info!(user_id = %user.id, username = %user.username, "Session issued");

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(LoginResponse {
            user: convert::user(user),
            token,
        }),
    ))
}

pub fn create_token(state: &AppState, user_id: &str, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use crate::middleware::decode_token;
    use parlor_db::Database;

    fn state(ttl: chrono::Duration) -> AppState {
        AppStateInner::new(Database::open_in_memory().unwrap(), "test-secret", ttl)
    }

    #[test]
    fn issued_tokens_decode_to_the_same_user() {
        let state = state(chrono::Duration::hours(1));
        let token = create_token(&state, "u-1", "alice").unwrap();

        let claims = decode_token(&state.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = state(chrono::Duration::hours(-2));
        let token = create_token(&expired, "u-1", "alice").unwrap();
        assert!(matches!(
            decode_token(&expired.jwt_secret, &token),
            Err(ApiError::Unauthorized)
        ));

        let fresh = state(chrono::Duration::hours(1));
        let token = create_token(&fresh, "u-1", "alice").unwrap();
        assert!(matches!(
            decode_token("another-secret", &token),
            Err(ApiError::Unauthorized)
        ));
    }
}
