pub mod auth;
pub mod conversations;
pub mod convert;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod reactions;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use murmur_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// All REST routes. Signup and login are public; everything else sits
/// behind `require_auth`.
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/users", get(users::search_users))
        .route("/auth/users/{user}", get(users::get_user_profile))
        .route("/auth/users/{user}/follow", post(users::toggle_follow))
        .route("/conversations", post(conversations::create_conversation))
        .route("/conversations", get(conversations::get_conversations))
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_messages))
        .route("/messages/{id}", delete(messages::delete_message))
        .route("/messages/{id}/status", put(messages::update_status))
        .route("/messages/{id}/star", post(messages::toggle_star))
        .route("/messages/{id}/reactions", post(reactions::toggle_reaction))
        .route("/posts", post(posts::create_post))
        .route("/posts", get(posts::get_posts))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/comment", post(posts::add_comment))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || f(&db)).await??;
    Ok(result)
}
