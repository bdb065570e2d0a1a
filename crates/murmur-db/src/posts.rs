use crate::models::{CommentRow, LikeRow, PostRow};
use crate::queries::placeholders;
use crate::{Database, timestamp};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

impl Database {
    // -- Posts --

    pub fn create_post(&self, id: &str, author_id: &str, image: &str, caption: Option<&str>) -> Result<PostRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, image, caption, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, author_id, image, caption, timestamp()],
            )?;
            query_post(conn, id)?.ok_or_else(|| anyhow!("Post vanished after insert: {}", id))
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// All posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, image, caption, created_at FROM posts
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Toggle the caller's like. Returns `(liked, like_count)` after the flip.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<(bool, usize)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                [post_id, user_id],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![post_id, user_id, timestamp()],
                )?;
            }
            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM post_likes WHERE post_id = ?1", [post_id], |r| r.get(0))?;
            tx.commit()?;
            Ok((removed == 0, count as usize))
        })
    }

    pub fn get_likes_for_posts(&self, post_ids: &[String]) -> Result<Vec<LikeRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT post_id, user_id FROM post_likes WHERE post_id IN ({}) ORDER BY created_at, rowid",
                placeholders(post_ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(post_ids.iter()), |row| {
                    Ok(LikeRow {
                        post_id: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn add_comment(&self, id: &str, post_id: &str, author_id: &str, text: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO post_comments (id, post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, post_id, author_id, text, timestamp()],
            )?;
            Ok(())
        })
    }

    /// Comments for a set of posts, oldest first.
    pub fn get_comments_for_posts(&self, post_ids: &[String]) -> Result<Vec<CommentRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, post_id, author_id, text, created_at FROM post_comments
                 WHERE post_id IN ({}) ORDER BY created_at, rowid",
                placeholders(post_ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(post_ids.iter()), |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let row = conn
        .query_row(
            "SELECT id, author_id, image, caption, created_at FROM posts WHERE id = ?1",
            [id],
            map_post,
        )
        .optional()?;
    Ok(row)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        image: row.get(2)?,
        caption: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tests::add_user;

    #[test]
    fn like_toggle_alternates_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let post = db.create_post("p1", &alice, "/img.png", Some("sunset")).unwrap();

        assert_eq!(db.toggle_like(&post.id, &bob).unwrap(), (true, 1));
        assert_eq!(db.toggle_like(&post.id, &alice).unwrap(), (true, 2));
        assert_eq!(db.toggle_like(&post.id, &bob).unwrap(), (false, 1));
        assert_eq!(db.toggle_like(&post.id, &bob).unwrap(), (true, 2));

        let likes = db.get_likes_for_posts(&[post.id.clone()]).unwrap();
        assert_eq!(likes.len(), 2);
    }

    #[test]
    fn posts_newest_first_with_comments_in_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        let older = db.create_post("p1", &alice, "/a.png", None).unwrap();
        let newer = db.create_post("p2", &alice, "/b.png", None).unwrap();

        let listed = db.list_posts().unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);

        db.add_comment("c1", &older.id, &alice, "first").unwrap();
        db.add_comment("c2", &older.id, &alice, "second").unwrap();
        let comments = db.get_comments_for_posts(&[older.id.clone(), newer.id.clone()]).unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
