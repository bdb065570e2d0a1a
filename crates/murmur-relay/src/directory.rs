use anyhow::Result;
use uuid::Uuid;

use murmur_db::Database;
use murmur_types::models::DeliveryStatus;

/// Store lookups the relay needs. Calls are blocking; sessions run them on
/// the blocking pool.
pub trait RoomDirectory: Send + Sync + 'static {
    /// Current username for an identified user, `None` if the account is gone.
    fn username(&self, user_id: Uuid) -> Result<Option<String>>;

    /// Whether the user may join the conversation's room.
    fn is_participant(&self, chat_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Record a recipient's delivery acknowledgement.
    ///
    /// Returns the conversation and new status only when the stored status
    /// actually moved forward. Acks from the sender, from non-participants
    /// and for unknown messages are ignored.
    fn acknowledge(&self, message_id: Uuid, user_id: Uuid, status: DeliveryStatus)
    -> Result<Option<(Uuid, DeliveryStatus)>>;

    fn touch_last_active(&self, user_id: Uuid) -> Result<()>;
}

impl RoomDirectory for Database {
    fn username(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.get_user_by_id(&user_id.to_string())?.map(|u| u.username))
    }

    fn is_participant(&self, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        Database::is_participant(self, &chat_id.to_string(), &user_id.to_string())
    }

    fn acknowledge(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        status: DeliveryStatus,
    ) -> Result<Option<(Uuid, DeliveryStatus)>> {
        let user = user_id.to_string();
        let Some(message) = self.get_message(&message_id.to_string())? else {
            return Ok(None);
        };
        if message.sender_id == user || !Database::is_participant(self, &message.conversation_id, &user)? {
            return Ok(None);
        }

        let Some(advanced) = self.advance_status(&message.id, status)? else {
            return Ok(None);
        };
        Ok(Some((message.conversation_id.parse()?, advanced)))
    }

    fn touch_last_active(&self, user_id: Uuid) -> Result<()> {
        Database::touch_last_active(self, &user_id.to_string())
    }
}
