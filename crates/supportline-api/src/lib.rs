pub mod error;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod state;
pub mod threads;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::{AppState, AppStateInner};

/// Full HTTP surface of the messaging core.
pub fn router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route("/chat/list", get(messages::list_messages))
        .route("/chat/all_chats", get(threads::all_chats))
        .route("/chat/send", post(messages::send_message))
        .route("/chat/edit", post(messages::edit_message))
        .route("/chat/delete", post(messages::delete_message))
        .route("/chat/react", post(reactions::react))
        .route("/chat/mark_read", put(threads::mark_read))
        .route("/chat/bootstrap", post(messages::bootstrap))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    let public_routes = Router::new().route("/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}
