use axum::{Extension, extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use murmur_types::api::{FollowResponse, PublicProfile, UserSummary};

use crate::auth::AppState;
use crate::convert::{parse_gender, parse_id, parse_timestamp, user_summary};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::AuthUser;
use crate::with_db;

const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

/// GET /auth/users?search=: case-insensitive substring match, caller excluded.
pub async fn search_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let term = query.search.trim().to_string();
    let caller = auth.id.to_string();

    let rows = with_db(&state, move |db| db.search_users(&term, &caller, SEARCH_LIMIT)).await?;
    let users: Vec<UserSummary> = rows.iter().map(user_summary).collect();
    Ok(Json(users))
}

/// GET /auth/users/{username}: public profile with followers and following.
pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, followers, following) = with_db(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        let followers = db.get_followers(&user.id)?;
        let following = db.get_following(&user.id)?;
        Ok(Some((user, followers, following)))
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(PublicProfile {
        id: parse_id(&user.id, "user id"),
        username: user.username.clone(),
        gender: parse_gender(&user.gender),
        vibe: user.vibe.clone(),
        accent_color: user.accent_color.clone(),
        profile_pic: user.profile_pic.clone(),
        bio: user.bio.clone(),
        followers: followers.iter().map(user_summary).collect(),
        following: following.iter().map(user_summary).collect(),
        created_at: parse_timestamp(&user.created_at),
    }))
}

/// POST /auth/users/{id}/follow: flip the caller's follow of the target.
pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    if target_id == auth.id {
        return Err(ApiError::Validation("You cannot follow yourself".into()));
    }

    let caller = auth.id.to_string();
    let target = target_id.to_string();
    let (following, ids) = with_db(&state, move |db| {
        if db.get_user_by_id(&target)?.is_none() {
            return Ok(None);
        }
        let following = db.toggle_follow(&caller, &target)?;
        let ids = db.following_ids(&caller)?;
        Ok(Some((following, ids)))
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(FollowResponse {
        following,
        user_following: ids.iter().map(|id| parse_id(id, "followee id")).collect(),
    }))
}
