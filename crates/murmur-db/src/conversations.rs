use crate::models::{ConversationRow, ParticipantRow};
use crate::queries::{USER_COLUMNS, map_user_at, placeholders};
use crate::{Database, timestamp};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

const CONVERSATION_COLUMNS: &str =
    "c.id, c.title, c.is_group, c.avatar, c.last_message, c.created_at, c.updated_at";

/// Normalized key for an unordered pair of participants.
pub fn private_pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

impl Database {
    /// Find the private conversation between `user_a` and `user_b`, creating
    /// it if none exists. Returns `(conversation, created)`.
    ///
    /// Uniqueness comes from the `pair_key` constraint, not from a lookup
    /// before the insert, so two racing requests still end up with one row.
    pub fn find_or_create_private(
        &self,
        id: &str,
        title: &str,
        user_a: &str,
        user_b: &str,
    ) -> Result<(ConversationRow, bool)> {
        let pair_key = private_pair_key(user_a, user_b);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = timestamp();
            let inserted = tx.execute(
                "INSERT INTO conversations (id, title, is_group, pair_key, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?4)
                 ON CONFLICT(pair_key) DO NOTHING",
                rusqlite::params![id, title, pair_key, now],
            )? == 1;

            if inserted {
                insert_participants(&tx, id, &[user_a, user_b])?;
            }

            let sql = format!("SELECT {} FROM conversations c WHERE c.pair_key = ?1", CONVERSATION_COLUMNS);
            let row = tx.query_row(&sql, [&pair_key], map_conversation)?;
            tx.commit()?;
            Ok((row, inserted))
        })
    }

    /// Create a group conversation. `participants` must already be deduplicated;
    /// their order is preserved.
    pub fn create_group(&self, id: &str, title: &str, participants: &[&str]) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = timestamp();
            tx.execute(
                "INSERT INTO conversations (id, title, is_group, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)",
                rusqlite::params![id, title, now],
            )?;
            insert_participants(&tx, id, participants)?;

            let row = query_conversation(&tx, id)?
                .ok_or_else(|| anyhow!("Conversation vanished after insert: {}", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// Conversations the user participates in, most recently updated first.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations c
                 JOIN conversation_participants p ON p.conversation_id = c.id
                 WHERE p.user_id = ?1
                 ORDER BY c.updated_at DESC, c.rowid DESC",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch participants (with their user rows) for a set of
    /// conversations, in participant order.
    pub fn get_participants(&self, conversation_ids: &[String]) -> Result<Vec<ParticipantRow>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.conversation_id, {} FROM conversation_participants p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.conversation_id IN ({})
                 ORDER BY p.conversation_id, p.position",
                USER_COLUMNS,
                placeholders(conversation_ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(conversation_ids.iter()), |row| {
                    Ok(ParticipantRow {
                        conversation_id: row.get(0)?,
                        user: map_user_at(row, 1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                    [conversation_id, user_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Refresh the sidebar preview and bump `updated_at`.
    pub fn touch_last_message(&self, conversation_id: &str, preview: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET last_message = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, preview, timestamp()],
            )?;
            if changed == 0 {
                return Err(anyhow!("Conversation not found: {}", conversation_id));
            }
            Ok(())
        })
    }
}

fn insert_participants(conn: &Connection, conversation_id: &str, participants: &[&str]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO conversation_participants (conversation_id, user_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, user_id) in participants.iter().enumerate() {
        stmt.execute(rusqlite::params![conversation_id, user_id, position as i64])?;
    }
    Ok(())
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let sql = format!("SELECT {} FROM conversations c WHERE c.id = ?1", CONVERSATION_COLUMNS);
    let row = conn.query_row(&sql, [id], map_conversation).optional()?;
    Ok(row)
}

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        title: row.get(1)?,
        is_group: row.get(2)?,
        avatar: row.get(3)?,
        last_message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
