//! Row → wire conversions. Corrupt columns are logged and replaced with
//! defaults rather than failing the whole response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use murmur_db::models::{
    CommentRow, ConversationRow, LikeRow, MessageRow, ParticipantRow, PostRow, ReactionRow, UserRow,
};
use murmur_types::api::{
    CommentResponse, ConversationResponse, MessageResponse, PostResponse, ReactionGroup, UserProfile,
    UserSummary,
};
use murmur_types::models::{DeliveryStatus, Gender, MessageKind};

pub fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", raw, e);
        DateTime::default()
    })
}

pub fn parse_gender(raw: &str) -> Gender {
    Gender::parse(raw).unwrap_or_else(|| {
        warn!("Unknown gender '{}'", raw);
        Gender::default()
    })
}

pub fn user_profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: parse_id(&row.id, "user id"),
        username: row.username.clone(),
        gender: parse_gender(&row.gender),
        vibe: row.vibe.clone(),
        accent_color: row.accent_color.clone(),
        chat_wallpaper: row.chat_wallpaper.clone(),
        sounds_enabled: row.sounds_enabled,
        profile_pic: row.profile_pic.clone(),
        bio: row.bio.clone(),
        last_active: parse_timestamp(&row.last_active),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn user_summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: parse_id(&row.id, "user id"),
        username: row.username.clone(),
        gender: parse_gender(&row.gender),
        vibe: row.vibe.clone(),
        accent_color: row.accent_color.clone(),
        profile_pic: row.profile_pic.clone(),
    }
}

/// Placeholder author for rows whose user has vanished.
fn unknown_user(id: &str) -> UserSummary {
    UserSummary {
        id: parse_id(id, "user id"),
        username: "unknown".to_string(),
        gender: Gender::default(),
        vibe: String::new(),
        accent_color: String::new(),
        profile_pic: String::new(),
    }
}

/// Build conversation responses, attaching each conversation's participants
/// in participant order.
pub fn conversations(rows: Vec<ConversationRow>, participants: Vec<ParticipantRow>) -> Vec<ConversationResponse> {
    let mut by_conversation: HashMap<String, Vec<UserSummary>> = HashMap::new();
    for p in &participants {
        by_conversation
            .entry(p.conversation_id.clone())
            .or_default()
            .push(user_summary(&p.user));
    }

    rows.into_iter()
        .map(|row| ConversationResponse {
            id: parse_id(&row.id, "conversation id"),
            participants: by_conversation.remove(&row.id).unwrap_or_default(),
            title: row.title,
            is_group: row.is_group,
            avatar: row.avatar,
            last_message: row.last_message,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
        .collect()
}

/// Group reactions by message_id -> emoji -> user_ids, keeping first-seen order.
fn group_reactions(reaction_rows: &[ReactionRow]) -> HashMap<String, Vec<ReactionGroup>> {
    let mut map: HashMap<String, Vec<ReactionGroup>> = HashMap::new();
    for r in reaction_rows {
        let groups = map.entry(r.message_id.clone()).or_default();
        let user_id = parse_id(&r.user_id, "reaction user id");
        match groups.iter_mut().find(|g| g.emoji == r.emoji) {
            Some(group) => {
                group.user_ids.push(user_id);
                group.count += 1;
            }
            None => groups.push(ReactionGroup {
                emoji: r.emoji.clone(),
                count: 1,
                user_ids: vec![user_id],
            }),
        }
    }
    map
}

pub fn reaction_groups(reaction_rows: &[ReactionRow]) -> Vec<ReactionGroup> {
    group_reactions(reaction_rows).into_values().flatten().collect()
}

pub fn messages(rows: Vec<MessageRow>, reaction_rows: &[ReactionRow]) -> Vec<MessageResponse> {
    let mut reactions = group_reactions(reaction_rows);
    rows.into_iter()
        .map(|row| {
            let groups = reactions.remove(&row.id).unwrap_or_default();
            message(row, groups)
        })
        .collect()
}

pub fn message(row: MessageRow, reactions: Vec<ReactionGroup>) -> MessageResponse {
    let kind = MessageKind::parse(&row.kind).unwrap_or_else(|| {
        warn!("Unknown kind '{}' on message '{}'", row.kind, row.id);
        MessageKind::default()
    });
    let status = DeliveryStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Unknown status '{}' on message '{}'", row.status, row.id);
        DeliveryStatus::default()
    });

    MessageResponse {
        id: parse_id(&row.id, "message id"),
        conversation_id: parse_id(&row.conversation_id, "conversation id"),
        sender_id: parse_id(&row.sender_id, "sender id"),
        sender_username: row.sender_username,
        text: row.text,
        kind,
        content_url: row.content_url,
        reply_to: row.reply_to.as_deref().map(|id| parse_id(id, "reply_to")),
        is_secret: row.is_secret,
        status,
        reactions,
        is_starred: row.is_starred,
        is_deleted: row.is_deleted,
        created_at: parse_timestamp(&row.created_at),
    }
}

/// Everything needed to render posts, fetched in batches.
pub struct PostParts {
    pub posts: Vec<PostRow>,
    pub authors: Vec<UserRow>,
    pub likes: Vec<LikeRow>,
    pub comments: Vec<CommentRow>,
}

pub fn posts(parts: PostParts) -> Vec<PostResponse> {
    let authors: HashMap<&str, &UserRow> = parts.authors.iter().map(|u| (u.id.as_str(), u)).collect();
    let summary = |id: &str| authors.get(id).map(|u| user_summary(u)).unwrap_or_else(|| unknown_user(id));

    let mut likes: HashMap<&str, Vec<Uuid>> = HashMap::new();
    for like in &parts.likes {
        likes
            .entry(like.post_id.as_str())
            .or_default()
            .push(parse_id(&like.user_id, "like user id"));
    }

    let mut comments: HashMap<&str, Vec<CommentResponse>> = HashMap::new();
    for c in &parts.comments {
        comments.entry(c.post_id.as_str()).or_default().push(CommentResponse {
            id: parse_id(&c.id, "comment id"),
            author: summary(&c.author_id),
            text: c.text.clone(),
            created_at: parse_timestamp(&c.created_at),
        });
    }

    parts
        .posts
        .iter()
        .map(|p| PostResponse {
            id: parse_id(&p.id, "post id"),
            author: summary(&p.author_id),
            image: p.image.clone(),
            caption: p.caption.clone(),
            likes: likes.remove(p.id.as_str()).unwrap_or_default(),
            comments: comments.remove(p.id.as_str()).unwrap_or_default(),
            created_at: parse_timestamp(&p.created_at),
        })
        .collect()
}
