use axum::{Extension, extract::State, response::IntoResponse};
use tracing::debug;
use uuid::Uuid;

use murmur_types::api::{ToggleReactionRequest, ToggleReactionResponse};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::messages::load_for_participant;
use crate::middleware::AuthUser;
use crate::with_db;

const MAX_EMOJI_LEN: usize = 32;

/// POST /messages/{id}/reactions: add the caller's emoji, or remove it if
/// already present. Returns the message's regrouped reactions.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_LEN {
        return Err(ApiError::Validation("Invalid emoji".into()));
    }

    let mid = message_id.to_string();
    let caller = auth.id.to_string();

    let (added, rows) = with_db(&state, move |db| {
        if let Err(e) = load_for_participant(db, &mid, &caller)? {
            return Ok(Err(e));
        }
        let added = db.toggle_reaction(&mid, &caller, &emoji)?;
        let rows = db.get_reactions_for_messages(&[mid.clone()])?;
        Ok(Ok((added, rows)))
    })
    .await??;

    debug!(
        "{} {} a reaction on {}",
        auth.username,
        if added { "added" } else { "removed" },
        message_id
    );

    Ok(Json(ToggleReactionResponse {
        added,
        reactions: convert::reaction_groups(&rows),
    }))
}
