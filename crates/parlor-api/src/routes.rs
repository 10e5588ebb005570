use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};

use crate::middleware::require_auth;
use crate::{AppState, auth, conversations, groups, messages, reactions, users};

/// Photos are capped at 10 MiB; base64 inside JSON inflates that by a third.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/session", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/me", get(users::get_me))
        .route("/me/username", put(users::update_username))
        .route("/me/photo", put(users::update_photo))
        .route("/users", get(users::search_users))
        .route("/conversations", get(conversations::list_conversations))
        .route("/direct-conversations", post(conversations::ensure_direct))
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route("/conversations/{conversation_id}/members", get(conversations::get_members))
        .route("/conversations/{conversation_id}/messages", post(messages::send_message))
        .route(
            "/conversations/{conversation_id}/messages/{message_id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/forward",
            post(messages::forward_message),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/status",
            put(messages::mark_status),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/receipts",
            get(messages::get_receipts),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/reaction",
            put(reactions::set_reaction).delete(reactions::remove_reaction),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/groups/{group_id}/members", post(groups::add_member))
        .route("/groups/{group_id}/members/me", delete(groups::leave_group))
        .route("/groups/{group_id}/name", put(groups::update_name))
        .route("/groups/{group_id}/photo", put(groups::update_photo))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

async fn health() -> &'static str {
    "ok"
}
