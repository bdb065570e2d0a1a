use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use murmur_types::api::{ConversationResponse, CreateConversationRequest};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::with_db;

const DEFAULT_TITLE: &str = "New Chat";

/// POST /conversations: find-or-create a private conversation, or create a group.
///
/// Private creation is idempotent per unordered pair: 201 when created,
/// 200 with the existing conversation otherwise.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    let requested = req.requested_participants();
    let caller = auth.id;

    let (row, participants, created) = if req.is_group {
        // Caller first, then requested ids in order, without duplicates.
        let mut members = vec![caller];
        for id in requested {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        if members.len() < 2 {
            return Err(ApiError::Validation("A group needs at least one other participant".into()));
        }

        let members: Vec<String> = members.iter().map(Uuid::to_string).collect();
        let conversation_id = Uuid::new_v4().to_string();
        with_db(&state, move |db| {
            if db.get_users_by_ids(&members)?.len() != members.len() {
                return Ok(None);
            }
            let refs: Vec<&str> = members.iter().map(String::as_str).collect();
            let row = db.create_group(&conversation_id, &title, &refs)?;
            let participants = db.get_participants(&[row.id.clone()])?;
            Ok(Some((row, participants, true)))
        })
        .await?
        .ok_or(ApiError::NotFound("Participant"))?
    } else {
        let &[other] = requested.as_slice() else {
            return Err(ApiError::Validation(
                "A private conversation needs exactly one participantId".into(),
            ));
        };
        if other == caller {
            return Err(ApiError::Validation("Cannot start a conversation with yourself".into()));
        }

        let (me, other) = (caller.to_string(), other.to_string());
        let conversation_id = Uuid::new_v4().to_string();
        with_db(&state, move |db| {
            if db.get_user_by_id(&other)?.is_none() {
                return Ok(None);
            }
            let (row, created) = db.find_or_create_private(&conversation_id, &title, &me, &other)?;
            let participants = db.get_participants(&[row.id.clone()])?;
            Ok(Some((row, participants, created)))
        })
        .await?
        .ok_or(ApiError::NotFound("Participant"))?
    };

    if created {
        info!(
            "{} created {} conversation {}",
            auth.username,
            if row.is_group { "group" } else { "private" },
            row.id
        );
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let response: Vec<ConversationResponse> = convert::conversations(vec![row], participants);
    let body = response
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("conversation conversion produced nothing"))?;

    Ok((status, Json(body)))
}

/// GET /conversations: the caller's conversations, most recently updated first.
pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = auth.id.to_string();
    let (rows, participants) = with_db(&state, move |db| {
        let rows = db.list_conversations_for_user(&caller)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let participants = db.get_participants(&ids)?;
        Ok((rows, participants))
    })
    .await?;

    Ok(Json(convert::conversations(rows, participants)))
}
