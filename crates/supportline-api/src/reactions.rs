use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use supportline_types::api::{Claims, ReactRequest, ReactResponse};

use crate::messages::note_advisory_user_id;
use crate::state::{AppState, run_blocking};

/// POST /chat/react. `action` defaults to a toggle; clients that may retry
/// send an explicit `add` or `remove`.
pub async fn react(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    note_advisory_user_id(&claims, req.user_id, "react");

    let actor = claims.actor();
    let (added, message) = run_blocking(&state, move |db| {
        db.react(&actor, req.message_id, &req.reaction, req.action)
    })
    .await?;

    Ok(Json(ReactResponse { added, message }))
}
