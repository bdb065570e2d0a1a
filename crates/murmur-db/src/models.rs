//! Database row types. These map directly to SQLite rows.
//! Distinct from murmur-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub gender: String,
    pub vibe: String,
    pub accent_color: String,
    pub chat_wallpaper: String,
    pub sounds_enabled: bool,
    pub profile_pic: String,
    pub bio: Option<String>,
    pub last_active: String,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub gender: &'a str,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub gender: Option<String>,
    pub vibe: Option<String>,
    pub accent_color: Option<String>,
    pub chat_wallpaper: Option<String>,
    pub sounds_enabled: Option<bool>,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub title: String,
    pub is_group: bool,
    pub avatar: Option<String>,
    pub last_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ParticipantRow {
    pub conversation_id: String,
    pub user: UserRow,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub text: Option<String>,
    pub kind: String,
    pub content_url: Option<String>,
    pub reply_to: Option<String>,
    pub is_secret: bool,
    pub status: String,
    pub is_starred: bool,
    pub is_deleted: bool,
    pub created_at: String,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub text: Option<&'a str>,
    pub kind: &'a str,
    pub content_url: Option<&'a str>,
    pub reply_to: Option<&'a str>,
    pub is_secret: bool,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub image: String,
    pub caption: Option<String>,
    pub created_at: String,
}

pub struct LikeRow {
    pub post_id: String,
    pub user_id: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}
