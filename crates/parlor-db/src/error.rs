use parlor_types::validate::ValidationError;
use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("store failure: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl DbError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        Self::Forbidden(why.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }
}

/// Constraint violations become domain errors; everything else is internal.
impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err {
            if code.code == ErrorCode::ConstraintViolation {
                let detail = msg.clone().unwrap_or_else(|| "constraint violation".into());
                match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return Self::Conflict(detail);
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        return Self::NotFound("referenced row".into());
                    }
                    _ => {}
                }
            }
        }
        Self::Internal(anyhow::Error::new(err))
    }
}

pub(crate) trait DbResultExt<T> {
    /// Attaches the failing operation to internal errors; domain errors pass through.
    fn op(self, name: &'static str) -> DbResult<T>;

    /// Replaces the message of a constraint conflict with a caller-facing one.
    fn on_conflict(self, what: impl FnOnce() -> String) -> DbResult<T>;
}

impl<T> DbResultExt<T> for DbResult<T> {
    fn op(self, name: &'static str) -> DbResult<T> {
        self.map_err(|e| match e {
            DbError::Internal(inner) => DbError::Internal(inner.context(name)),
            other => other,
        })
    }

    fn on_conflict(self, what: impl FnOnce() -> String) -> DbResult<T> {
        self.map_err(|e| match e {
            DbError::Conflict(_) => DbError::Conflict(what()),
            other => other,
        })
    }
}
