use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use supportline_db::NewMessage;
use supportline_types::Side;
use supportline_types::api::{
    BootstrapResponse, Claims, DeleteMessageRequest, DeleteMessageResponse, EditMessageRequest,
    ListQuery, SendMessageRequest,
};

use crate::state::{AppState, resolve_thread, run_blocking};

/// Body fields naming an identity are kept for wire compatibility only.
/// The session decides who the caller is.
pub(crate) fn note_advisory_user_id(claims: &Claims, supplied: Option<Uuid>, op: &str) {
    if let Some(supplied) = supplied {
        if supplied != claims.sub {
            warn!(
                "{}: body user_id {} ignored, session user is {}",
                op, supplied, claims.sub
            );
        }
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let thread_id = resolve_thread(&claims.actor(), query.thread_id)?;
    let messages = run_blocking(&state, move |db| db.list_messages(thread_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let actor = claims.actor();
    if let Some(claimed) = req.author_side {
        if claimed != actor.side {
            warn!(
                "send: body author_side {} ignored, session side is {}",
                claimed, actor.side
            );
        }
    }

    let thread_id = resolve_thread(&actor, req.thread_id)?;
    let attachment = req.attachment().map_err(|e| {
        debug!("Rejected send: {}", e);
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let new = NewMessage {
        thread_id,
        body: req.message,
        attachment,
        reply_to_id: req.reply_to_id,
    };
    let message = run_blocking(&state, move |db| db.send_message(&actor, new)).await?;

    info!(
        "Message {} from {} {} in thread {}",
        message.id, actor.side, actor.id, thread_id
    );
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    note_advisory_user_id(&claims, req.user_id, "edit");

    let actor = claims.actor();
    let message_id = req.message_id;
    let message =
        run_blocking(&state, move |db| db.edit_message(&actor, message_id, &req.message)).await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeleteMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    note_advisory_user_id(&claims, req.user_id, "delete");

    let actor = claims.actor();
    let message_id = req.message_id;
    run_blocking(&state, move |db| db.delete_message(&actor, message_id)).await?;

    info!("Message {} deleted by {} {}", message_id, actor.side, actor.id);
    Ok(Json(DeleteMessageResponse { deleted: message_id }))
}

/// POST /chat/bootstrap: greet a user whose thread is still empty.
/// The store re-checks emptiness, so a repeated call never duplicates it.
pub async fn bootstrap(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let actor = claims.actor();
    if actor.side != Side::User {
        return Err(StatusCode::FORBIDDEN);
    }

    let greeting = state.greeting.clone();
    let created =
        run_blocking(&state, move |db| db.insert_greeting(actor.id, &greeting)).await?;

    if let Some(message) = &created {
        info!("Greeted new thread {} with message {}", actor.id, message.id);
    }
    Ok(Json(BootstrapResponse { created }))
}
