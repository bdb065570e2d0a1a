use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DeliveryStatus, Gender, MessageKind};

// -- JWT Claims --

/// JWT claims shared by the REST auth gate and the relay's identify step.
/// Carries only the user id; everything else is re-read from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<Gender>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by signup, login and profile update.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

/// The caller's own profile, including client preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub gender: Gender,
    pub vibe: String,
    pub accent_color: String,
    pub chat_wallpaper: String,
    pub sounds_enabled: bool,
    pub profile_pic: String,
    pub bio: Option<String>,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub gender: Option<Gender>,
    pub vibe: Option<String>,
    pub accent_color: Option<String>,
    pub chat_wallpaper: Option<String>,
    pub sounds_enabled: Option<bool>,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
}

// -- Users --

/// Compact user view embedded in conversations, posts and search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub gender: Gender,
    pub vibe: String,
    pub accent_color: String,
    pub profile_pic: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub gender: Gender,
    pub vibe: String,
    pub accent_color: String,
    pub profile_pic: String,
    pub bio: Option<String>,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    /// Whether the caller follows the target after the toggle.
    pub following: bool,
    /// Everyone the caller follows after the toggle.
    pub user_following: Vec<Uuid>,
}

// -- Conversations --

/// `participantId` is accepted either as a single id or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParticipantRef {
    One(Uuid),
    Many(Vec<Uuid>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub participant_id: Option<ParticipantRef>,
    pub participant_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub is_group: bool,
    pub title: Option<String>,
}

impl CreateConversationRequest {
    /// All requested participant ids, in request order.
    pub fn requested_participants(&self) -> Vec<Uuid> {
        let mut ids = match &self.participant_id {
            Some(ParticipantRef::One(id)) => vec![*id],
            Some(ParticipantRef::Many(ids)) => ids.clone(),
            None => vec![],
        };
        if let Some(more) = &self.participant_ids {
            ids.extend(more.iter().copied());
        }
        ids
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub title: String,
    pub is_group: bool,
    pub avatar: Option<String>,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub content_url: Option<String>,
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub is_secret: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content_url: Option<String>,
    pub reply_to: Option<Uuid>,
    pub is_secret: bool,
    pub status: DeliveryStatus,
    pub reactions: Vec<ReactionGroup>,
    pub is_starred: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StarResponse {
    pub starred: bool,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub added: bool,
    pub reactions: Vec<ReactionGroup>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub image: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub author: UserSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub author: UserSummary,
    pub image: String,
    pub caption: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub count: usize,
}
