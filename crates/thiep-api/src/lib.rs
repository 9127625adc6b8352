//! HTTP and WebSocket surface over `thiep-core`.

pub mod auth;
pub mod cards;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use auth::AppState;

/// All routes. Callers add transport layers (CORS, tracing) on top.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/anonymous", post(auth::anonymous))
        .route("/cards/{card_id}", get(cards::get_card));

    let protected_routes = Router::new()
        .route("/users", get(users::list_friends))
        .route("/cards", post(cards::send_card))
        .route("/cards/sent", get(cards::sent))
        .route("/cards/received", get(cards::received))
        .route("/chat/{peer_id}/messages", get(chat::get_messages))
        .route("/chat/{peer_id}/messages", post(chat::send_message))
        .route("/chat/{peer_id}/live", get(chat::live))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
