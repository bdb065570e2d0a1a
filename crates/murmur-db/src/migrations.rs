use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                gender          TEXT NOT NULL DEFAULT 'Boy',
                vibe            TEXT NOT NULL DEFAULT 'Chill',
                accent_color    TEXT NOT NULL DEFAULT '#8B5CF6',
                chat_wallpaper  TEXT NOT NULL DEFAULT 'dots',
                sounds_enabled  INTEGER NOT NULL DEFAULT 1,
                profile_pic     TEXT NOT NULL DEFAULT '',
                bio             TEXT,
                last_active     TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE follows (
                follower_id TEXT NOT NULL REFERENCES users(id),
                followee_id TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            );

            CREATE INDEX idx_follows_followee ON follows(followee_id);

            -- pair_key is set only for private conversations: the two participant
            -- ids sorted and joined. UNIQUE allows any number of NULLs (groups).
            CREATE TABLE conversations (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                is_group      INTEGER NOT NULL DEFAULT 0,
                avatar        TEXT,
                last_message  TEXT,
                pair_key      TEXT UNIQUE,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE TABLE conversation_participants (
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                position        INTEGER NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_participants_user ON conversation_participants(user_id);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                text            TEXT,
                kind            TEXT NOT NULL DEFAULT 'text',
                content_url     TEXT,
                reply_to        TEXT REFERENCES messages(id),
                is_secret       INTEGER NOT NULL DEFAULT 0,
                status          TEXT NOT NULL DEFAULT 'sent',
                is_starred      INTEGER NOT NULL DEFAULT 0,
                is_deleted      INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

            CREATE TABLE reactions (
                message_id  TEXT NOT NULL REFERENCES messages(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id, emoji)
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                image       TEXT NOT NULL,
                caption     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE post_likes (
                post_id     TEXT NOT NULL REFERENCES posts(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE post_comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id),
                author_id   TEXT NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON post_comments(post_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
