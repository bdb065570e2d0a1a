use crate::models::{NewUser, ProfileUpdate, UserRow};
use crate::{Database, timestamp};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

pub(crate) const USER_COLUMNS: &str = "u.id, u.username, u.password, u.gender, u.vibe, u.accent_color, \
     u.chat_wallpaper, u.sounds_enabled, u.profile_pic, u.bio, u.last_active, u.created_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` if the username is already taken;
    /// the UNIQUE constraint decides, so concurrent signups cannot both win.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let now = timestamp();
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password, gender, last_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(username) DO NOTHING",
                rusqlite::params![user.id, user.username, user.password_hash, user.gender, now],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    /// Batch-fetch users. Missing ids are silently skipped.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users u WHERE u.id IN ({})",
                USER_COLUMNS,
                placeholders(ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial profile update. Returns the updated row, or `None` if
    /// the user does not exist.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    gender         = COALESCE(?2, gender),
                    vibe           = COALESCE(?3, vibe),
                    accent_color   = COALESCE(?4, accent_color),
                    chat_wallpaper = COALESCE(?5, chat_wallpaper),
                    sounds_enabled = COALESCE(?6, sounds_enabled),
                    profile_pic    = COALESCE(?7, profile_pic),
                    bio            = COALESCE(?8, bio)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.gender,
                    update.vibe,
                    update.accent_color,
                    update.chat_wallpaper,
                    update.sounds_enabled,
                    update.profile_pic,
                    update.bio,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "u.id = ?1", id)
        })
    }

    /// Case-insensitive substring match on username, excluding `exclude_id`.
    pub fn search_users(&self, term: &str, exclude_id: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", escape_like(term));
            let sql = format!(
                "SELECT {} FROM users u
                 WHERE u.username LIKE ?1 ESCAPE '\\' AND u.id != ?2
                 ORDER BY u.username
                 LIMIT ?3",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, exclude_id, limit], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn touch_last_active(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_active = ?2 WHERE id = ?1",
                rusqlite::params![id, timestamp()],
            )?;
            Ok(())
        })
    }

    // -- Follows --

    /// Toggle a follow edge: removes if it exists, inserts if not.
    /// Returns whether `follower_id` follows `followee_id` afterwards.
    pub fn toggle_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                rusqlite::params![follower_id, followee_id],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![follower_id, followee_id, timestamp()],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    /// Ids the user follows, oldest follow first.
    pub fn following_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY created_at, rowid",
            )?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    pub fn get_followers(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM follows f JOIN users u ON u.id = f.follower_id
                 WHERE f.followee_id = ?1 ORDER BY f.created_at, f.rowid",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_following(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM follows f JOIN users u ON u.id = f.followee_id
                 WHERE f.follower_id = ?1 ORDER BY f.created_at, f.rowid",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users u WHERE {}", USER_COLUMNS, filter);
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

/// Maps a row selected with `USER_COLUMNS`, starting at column 0.
pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    map_user_at(row, 0)
}

pub(crate) fn map_user_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        password: row.get(offset + 2)?,
        gender: row.get(offset + 3)?,
        vibe: row.get(offset + 4)?,
        accent_color: row.get(offset + 5)?,
        chat_wallpaper: row.get(offset + 6)?,
        sounds_enabled: row.get(offset + 7)?,
        profile_pic: row.get(offset + 8)?,
        bio: row.get(offset + 9)?,
        last_active: row.get(offset + 10)?,
        created_at: row.get(offset + 11)?,
    })
}

/// `?start, ?start+1, ...` for `count` positional parameters.
pub(crate) fn placeholders(count: usize, start: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
