use crate::models::{MessageRow, NewMessage, ReactionRow};
use crate::queries::placeholders;
use crate::{Database, timestamp};
use anyhow::{Result, anyhow};
use murmur_types::models::DeliveryStatus;
use rusqlite::{Connection, OptionalExtension, Row};

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, u.username, m.text, m.kind, \
     m.content_url, m.reply_to, m.is_secret, m.status, m.is_starred, m.is_deleted, m.created_at";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, conversation_id, sender_id, text, kind, content_url, reply_to, is_secret, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    msg.id,
                    msg.conversation_id,
                    msg.sender_id,
                    msg.text,
                    msg.kind,
                    msg.content_url,
                    msg.reply_to,
                    msg.is_secret,
                    timestamp(),
                ],
            )?;
            query_message(conn, msg.id)?.ok_or_else(|| anyhow!("Message vanished after insert: {}", msg.id))
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Messages of a conversation, oldest first. Insertion order breaks
    /// timestamp ties. With `after`, only messages inserted after that
    /// message are returned.
    pub fn get_messages(&self, conversation_id: &str, after: Option<&str>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the sender username in a single query
            let sql = format!(
                "SELECT {} FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1
                   AND (?2 IS NULL OR m.rowid > (SELECT rowid FROM messages WHERE id = ?2))
                 ORDER BY m.created_at ASC, m.rowid ASC",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, after], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Move a message's status forward. Returns the new status if it
    /// advanced, `None` if the requested status would be a regression or a
    /// repeat. Errors if the message does not exist.
    pub fn advance_status(&self, message_id: &str, next: DeliveryStatus) -> Result<Option<DeliveryStatus>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: String = tx
                .query_row("SELECT status FROM messages WHERE id = ?1", [message_id], |row| row.get(0))
                .optional()?
                .ok_or_else(|| anyhow!("Message not found: {}", message_id))?;

            let current = DeliveryStatus::parse(&current)
                .ok_or_else(|| anyhow!("Corrupt status '{}' on message {}", current, message_id))?;

            let advanced = current.advance(next);
            if let Some(status) = advanced {
                tx.execute(
                    "UPDATE messages SET status = ?2 WHERE id = ?1",
                    rusqlite::params![message_id, status.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(advanced)
        })
    }

    /// Flip the starred flag. Returns the new value.
    pub fn toggle_star(&self, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let starred = conn.query_row(
                "UPDATE messages SET is_starred = NOT is_starred WHERE id = ?1 RETURNING is_starred",
                [message_id],
                |row| row.get(0),
            )?;
            Ok(starred)
        })
    }

    /// Soft delete: the row stays so history and replies keep their shape,
    /// but its content is cleared.
    pub fn soft_delete_message(&self, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_deleted = 1, text = NULL, content_url = NULL WHERE id = ?1",
                [message_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Recompute a conversation's preview from its newest surviving message,
    /// or clear it when none is left. `updated_at` is left alone.
    pub fn refresh_last_message(&self, conversation_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET last_message = (
                     SELECT COALESCE(m.text, 'Sent an ' || m.kind) FROM messages m
                     WHERE m.conversation_id = ?1 AND m.is_deleted = 0
                     ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1
                 ) WHERE id = ?1",
                [conversation_id],
            )?;
            if changed == 0 {
                return Err(anyhow!("Conversation not found: {}", conversation_id));
            }
            Ok(())
        })
    }

    // -- Reactions --

    /// Toggle a reaction: removes if it exists, inserts if not.
    /// Returns `true` if the reaction was added.
    pub fn toggle_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id, user_id, emoji],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO reactions (message_id, user_id, emoji, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![message_id, user_id, emoji, timestamp()],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn get_reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, emoji, created_at FROM reactions
                 WHERE message_id IN ({})
                 ORDER BY created_at, rowid",
                placeholders(message_ids.len(), 1)
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids.iter()), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages m LEFT JOIN users u ON m.sender_id = u.id WHERE m.id = ?1",
        MESSAGE_COLUMNS
    );
    let row = conn.query_row(&sql, [id], map_message).optional()?;
    Ok(row)
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        text: row.get(4)?,
        kind: row.get(5)?,
        content_url: row.get(6)?,
        reply_to: row.get(7)?,
        is_secret: row.get(8)?,
        status: row.get(9)?,
        is_starred: row.get(10)?,
        is_deleted: row.get(11)?,
        created_at: row.get(12)?,
    })
}
