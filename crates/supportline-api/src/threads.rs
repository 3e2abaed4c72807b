use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use supportline_types::Side;
use supportline_types::api::{Claims, MarkReadRequest, MarkReadResponse};

use crate::state::{AppState, resolve_thread, run_blocking};

/// GET /chat/all_chats: staff thread list.
pub async fn all_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.actor().side != Side::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    let summaries = run_blocking(&state, |db| db.thread_summaries()).await?;
    Ok(Json(summaries))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let actor = claims.actor();
    if let Some(is_admin) = req.is_admin {
        if Side::from_is_admin(is_admin) != actor.side {
            warn!(
                "mark_read: body is_admin={} ignored, session side is {}",
                is_admin, actor.side
            );
        }
    }

    let thread_id = resolve_thread(&actor, req.thread_id)?;
    let updated = run_blocking(&state, move |db| db.mark_read(actor.side, thread_id)).await?;
    Ok(Json(MarkReadResponse { updated }))
}
