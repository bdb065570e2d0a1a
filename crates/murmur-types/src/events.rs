use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::DeliveryStatus;

/// Events sent FROM server TO client over the relay socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RelayEvent {
    /// Server confirms the connection is identified
    Ready { user_id: Uuid, username: String },

    /// The connection is now a member of the room
    Joined { chat_id: Uuid },

    /// The join was refused (unknown conversation or caller not a participant)
    JoinRejected { chat_id: Uuid, reason: String },

    /// Another member of the room is typing
    Typing {
        chat_id: Uuid,
        user_id: Uuid,
        username: String,
        is_typing: bool,
    },

    /// Another member relayed a message it already persisted over REST.
    /// `seq` increases by one per relayed message in the room.
    MessageReceived {
        chat_id: Uuid,
        seq: u64,
        from_user_id: Uuid,
        message: serde_json::Value,
    },

    /// A message's stored delivery status moved forward
    StatusUpdate {
        chat_id: Uuid,
        message_id: Uuid,
        status: DeliveryStatus,
        user_id: Uuid,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },
}

impl RelayEvent {
    /// Returns the room this event is scoped to, if any.
    /// Events that return `None` are global.
    pub fn chat_id(&self) -> Option<Uuid> {
        match self {
            Self::Joined { chat_id }
            | Self::JoinRejected { chat_id, .. }
            | Self::Typing { chat_id, .. }
            | Self::MessageReceived { chat_id, .. }
            | Self::StatusUpdate { chat_id, .. } => Some(*chat_id),
            Self::Ready { .. } | Self::PresenceUpdate { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over the relay socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RelayCommand {
    /// Authenticate the connection. Must be the first frame.
    Identify { token: String },

    /// Start receiving a conversation's events
    JoinChat { chat_id: Uuid },

    /// Stop receiving a conversation's events
    LeaveChat { chat_id: Uuid },

    /// Typing indicator for a conversation
    Typing {
        chat_id: Uuid,
        #[serde(default = "default_true")]
        is_typing: bool,
    },

    /// Fan out a message the sender already persisted over REST.
    ///
    /// The target room is the envelope's `chatId`. Any room or sender field
    /// inside `message` is never read: the payload is forwarded untouched as
    /// `message_received.message`, and the hub stamps the sender and the
    /// room's sequence number beside it.
    NewMessage {
        chat_id: Uuid,
        message: serde_json::Value,
    },

    /// Report that a relayed message was delivered to or read by this client
    MessageAck {
        message_id: Uuid,
        status: DeliveryStatus,
    },
}

fn default_true() -> bool {
    true
}
