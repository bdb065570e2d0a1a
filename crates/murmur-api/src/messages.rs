use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{MessageRow, NewMessage};
use murmur_types::api::{SendMessageRequest, StarResponse, UpdateStatusRequest};
use murmur_types::models::MessageKind;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::with_db;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Cursor for reconnect catch-up: only messages sent after this one.
    pub after: Option<Uuid>,
}

/// Load a message and check the caller participates in its conversation.
/// Shared by every per-message route.
pub(crate) fn load_for_participant(
    db: &Database,
    message_id: &str,
    user_id: &str,
) -> anyhow::Result<Result<MessageRow, ApiError>> {
    let Some(row) = db.get_message(message_id)? else {
        return Ok(Err(ApiError::NotFound("Message")));
    };
    if !db.is_participant(&row.conversation_id, user_id)? {
        return Ok(Err(ApiError::Forbidden("Not a participant of this conversation".into())));
    }
    Ok(Ok(row))
}

/// POST /messages: durably append a message, then refresh the
/// conversation's sidebar preview.
///
/// The insert is authoritative. The preview update is a best-effort cache:
/// if it fails the message still exists and the failure is only logged.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.filter(|t| !t.trim().is_empty());
    let content_url = req.content_url.filter(|u| !u.trim().is_empty());
    match req.kind {
        MessageKind::Text if text.is_none() => {
            return Err(ApiError::Validation("Text messages need text".into()));
        }
        MessageKind::Image | MessageKind::Audio if content_url.is_none() => {
            return Err(ApiError::Validation(format!(
                "{} messages need a contentUrl",
                req.kind.as_str()
            )));
        }
        _ => {}
    }

    let conversation_id = req.conversation_id.to_string();
    let sender_id = auth.id.to_string();
    let reply_to = req.reply_to.map(|id| id.to_string());
    let kind = req.kind;
    let is_secret = req.is_secret;
    let message_id = Uuid::new_v4().to_string();

    let preview = text
        .clone()
        .unwrap_or_else(|| format!("Sent an {}", kind.as_str()));

    let row = with_db(&state, move |db| {
        if db.get_conversation(&conversation_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Conversation")));
        }
        if !db.is_participant(&conversation_id, &sender_id)? {
            return Ok(Err(ApiError::Forbidden("Not a participant of this conversation".into())));
        }
        if let Some(target) = &reply_to {
            match db.get_message(target)? {
                Some(m) if m.conversation_id == conversation_id => {}
                _ => {
                    return Ok(Err(ApiError::Validation(
                        "replyTo must reference a message in the same conversation".into(),
                    )));
                }
            }
        }

        let row = db.insert_message(&NewMessage {
            id: &message_id,
            conversation_id: &conversation_id,
            sender_id: &sender_id,
            text: text.as_deref(),
            kind: kind.as_str(),
            content_url: content_url.as_deref(),
            reply_to: reply_to.as_deref(),
            is_secret,
        })?;

        if let Err(e) = db.touch_last_message(&conversation_id, &preview) {
            warn!("Message {} stored but preview update failed: {:#}", message_id, e);
        }

        Ok(Ok(row))
    })
    .await??;

    debug!("{} sent message {} to {}", auth.username, row.id, row.conversation_id);

    Ok((StatusCode::CREATED, Json(convert::message(row, vec![]))))
}

/// GET /messages/{conversation_id}: oldest first, optionally after a cursor.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = conversation_id.to_string();
    let caller = auth.id.to_string();
    let after = query.after.map(|id| id.to_string());

    let (rows, reaction_rows) = with_db(&state, move |db| {
        if db.get_conversation(&cid)?.is_none() {
            return Ok(Err(ApiError::NotFound("Conversation")));
        }
        if !db.is_participant(&cid, &caller)? {
            return Ok(Err(ApiError::Forbidden("Not a participant of this conversation".into())));
        }
        if let Some(cursor) = &after {
            match db.get_message(cursor)? {
                Some(m) if m.conversation_id == cid => {}
                _ => return Ok(Err(ApiError::Validation("Unknown cursor message".into()))),
            }
        }

        let rows = db.get_messages(&cid, after.as_deref())?;
        let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reaction_rows = db.get_reactions_for_messages(&message_ids)?;
        Ok(Ok((rows, reaction_rows)))
    })
    .await??;

    Ok(Json(convert::messages(rows, &reaction_rows)))
}

/// PUT /messages/{id}/status: recipients move delivery status forward.
/// Regressions are ignored and the current state is returned.
pub async fn update_status(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let caller = auth.id.to_string();

    let (row, reaction_rows) = with_db(&state, move |db| {
        let row = match load_for_participant(db, &mid, &caller)? {
            Ok(row) => row,
            Err(e) => return Ok(Err(e)),
        };
        if row.sender_id == caller {
            return Ok(Err(ApiError::Forbidden("Only recipients can update delivery status".into())));
        }

        db.advance_status(&mid, req.status)?;
        let row = db
            .get_message(&mid)?
            .ok_or_else(|| anyhow::anyhow!("Message vanished: {}", mid))?;
        let reaction_rows = db.get_reactions_for_messages(&[mid.clone()])?;
        Ok(Ok((row, reaction_rows)))
    })
    .await??;

    Ok(Json(convert::message(row, convert::reaction_groups(&reaction_rows))))
}

/// POST /messages/{id}/star: flip the starred flag.
pub async fn toggle_star(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let caller = auth.id.to_string();

    let starred = with_db(&state, move |db| {
        if let Err(e) = load_for_participant(db, &mid, &caller)? {
            return Ok(Err(e));
        }
        Ok(Ok(db.toggle_star(&mid)?))
    })
    .await??;

    Ok(Json(StarResponse { starred }))
}

/// DELETE /messages/{id}: sender-only soft delete. The conversation
/// preview falls back to the newest message still standing.
///
/// Peers that already rendered a relayed copy keep it until they refetch.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mid = message_id.to_string();
    let caller = auth.id.to_string();

    with_db(&state, move |db| {
        let row = match load_for_participant(db, &mid, &caller)? {
            Ok(row) => row,
            Err(e) => return Ok(Err(e)),
        };
        if row.sender_id != caller {
            return Ok(Err(ApiError::Forbidden("Only the sender can delete a message".into())));
        }
        db.soft_delete_message(&mid)?;
        if let Err(e) = db.refresh_last_message(&row.conversation_id) {
            warn!("Message {} deleted but preview refresh failed: {:#}", mid, e);
        }
        Ok(Ok(()))
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
