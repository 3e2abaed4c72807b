use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;
use uuid::Uuid;

use supportline_db::{Database, StoreError};
use supportline_types::{Actor, Side};

use crate::error::store_status;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Onboarding text inserted into a user's empty thread.
    pub greeting: String,
}

/// Run a store operation off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(store_status)
}

/// Thread addressed by a request. Users are pinned to their own thread;
/// staff must name one.
pub fn resolve_thread(actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, StatusCode> {
    match (actor.side, requested) {
        (Side::User, None) => Ok(actor.id),
        (Side::User, Some(thread_id)) if thread_id == actor.id => Ok(thread_id),
        (Side::User, Some(_)) => Err(StatusCode::FORBIDDEN),
        (Side::Admin, Some(thread_id)) => Ok(thread_id),
        (Side::Admin, None) => Err(StatusCode::BAD_REQUEST),
    }
}
