pub mod auth;
pub mod conversations;
mod convert;
pub mod error;
pub mod groups;
pub mod messages;
pub mod middleware;
mod photo;
pub mod reactions;
pub mod routes;
pub mod users;

use std::sync::Arc;

use chrono::Duration;
use parlor_db::{Database, DbResult};
use tracing::error;

use crate::error::ApiError;

pub use routes::router;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>, token_ttl: Duration) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
            token_ttl,
        })
    }
}

/// Runs a store call on tokio's blocking pool.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("store task failed: {}", e))
        })?
        .map_err(ApiError::from)
}
