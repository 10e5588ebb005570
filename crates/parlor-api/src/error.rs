use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parlor_db::DbError;
use parlor_types::api::ErrorResponse;
use parlor_types::validate::ValidationError;
use thiserror::Error;
use tracing::error;

/// Everything a handler can fail with. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("photos must be JPEG or PNG")]
    UnsupportedMedia,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Db(DbError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Invalid(e) => validation_status(e),
            Self::Db(DbError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Db(DbError::Forbidden(_)) => StatusCode::FORBIDDEN,
            Self::Db(DbError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Db(DbError::Invalid(e)) => validation_status(e),
            Self::Db(DbError::Internal(_)) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn validation_status(err: &ValidationError) -> StatusCode {
    match err {
        ValidationError::PhotoTooLarge { .. } | ValidationError::AttachmentTooLarge { .. } => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Invalid(e) => Self::Invalid(e),
            other => Self::Db(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let cases = [
            (DbError::not_found("message"), StatusCode::NOT_FOUND),
            (DbError::forbidden("not yours"), StatusCode::FORBIDDEN),
            (DbError::conflict("taken"), StatusCode::CONFLICT),
            (DbError::Invalid(ValidationError::InvalidName), StatusCode::BAD_REQUEST),
            (
                DbError::Invalid(ValidationError::PhotoTooLarge { size: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (anyhow::anyhow!("disk gone").into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_details_are_not_rendered() {
        let response = ApiError::Internal(anyhow::anyhow!("secret path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
