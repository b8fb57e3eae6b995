/// Database schema initialization.
/// Sets up SQLite pragmas and creates tables on startup.
use rusqlite::{Connection, Result as SqliteResult};

/// Initialize database connection with WAL mode, foreign keys and schema
pub fn initialize_database(conn: &Connection) -> SqliteResult<()> {
    // Enable WAL mode (for file-based DB only, ignore error for in-memory)
    let _ = conn.execute("PRAGMA journal_mode = WAL", []);
    let _ = conn.execute("PRAGMA synchronous = NORMAL", []);
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    create_schema(conn)?;

    Ok(())
}

/// Create all database tables.
///
/// Composite primary keys and the one-to-one pair index are what make the
/// relation tables race-safe; the core maps their violations to typed errors.
fn create_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            user_name TEXT UNIQUE NOT NULL,
            full_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            avatar TEXT,
            bio TEXT,
            followers INTEGER NOT NULL DEFAULT 0 CHECK (followers >= 0),
            following INTEGER NOT NULL DEFAULT 0 CHECK (following >= 0),
            posts INTEGER NOT NULL DEFAULT 0 CHECK (posts >= 0),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL,
            followed_id TEXT NOT NULL,
            follow_date TEXT NOT NULL,
            PRIMARY KEY (follower_id, followed_id),
            FOREIGN KEY(follower_id) REFERENCES users(id),
            FOREIGN KEY(followed_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS photos (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            sharings INTEGER NOT NULL DEFAULT 0 CHECK (sharings >= 0),
            savings INTEGER NOT NULL DEFAULT 0 CHECK (savings >= 0),
            marked_users INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            date_of_publishing TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS likes (
            user_id TEXT NOT NULL,
            content_kind TEXT NOT NULL,
            content_id TEXT NOT NULL,
            liked_at TEXT NOT NULL,
            PRIMARY KEY (user_id, content_kind, content_id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS saved_content (
            user_id TEXT NOT NULL,
            photo_id TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            PRIMARY KEY (user_id, photo_id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(photo_id) REFERENCES photos(id)
        );

        CREATE TABLE IF NOT EXISTS marked_users (
            photo_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (photo_id, user_id),
            FOREIGN KEY(photo_id) REFERENCES photos(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL CHECK (type IN ('one-to-one', 'group')),
            user1 TEXT,
            user2 TEXT,
            name TEXT,
            cover TEXT,
            creator_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user1) REFERENCES users(id),
            FOREIGN KEY(user2) REFERENCES users(id),
            FOREIGN KEY(creator_id) REFERENCES users(id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_one_to_one_pair
            ON chats(min(user1, user2), max(user1, user2))
            WHERE type = 'one-to-one';

        CREATE TABLE IF NOT EXISTS group_chats_participants (
            chat_id TEXT NOT NULL,
            participant_id TEXT NOT NULL,
            joined_at TEXT NOT NULL,
            PRIMARY KEY (chat_id, participant_id),
            FOREIGN KEY(chat_id) REFERENCES chats(id),
            FOREIGN KEY(participant_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            type TEXT NOT NULL,
            text_content TEXT,
            media_url TEXT,
            shared_post_id TEXT,
            sent_at TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            FOREIGN KEY(chat_id) REFERENCES chats(id),
            FOREIGN KEY(sender_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed_id);
        CREATE INDEX IF NOT EXISTS idx_photos_user ON photos(user_id);
        CREATE INDEX IF NOT EXISTS idx_likes_content ON likes(content_kind, content_id);
        CREATE INDEX IF NOT EXISTS idx_participants_user ON group_chats_participants(participant_id);
        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        "#,
    )?;

    Ok(())
}
