use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (messages, reactions)");
        conn.execute_batch(
            "
            -- AUTOINCREMENT: ids of deleted messages are never handed out again
            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id       TEXT NOT NULL,
                author_id       TEXT NOT NULL,
                author_side     TEXT NOT NULL CHECK (author_side IN ('user', 'admin')),
                body            TEXT NOT NULL DEFAULT '',
                attachment_kind TEXT CHECK (attachment_kind IN ('image', 'file')),
                attachment_url  TEXT,
                attachment_name TEXT,
                attachment_mime TEXT,
                reply_to_id     INTEGER,
                edited_at       TEXT,
                created_at      TEXT NOT NULL,
                read_by_user    INTEGER NOT NULL DEFAULT 0,
                read_by_admin   INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_thread
                ON messages(thread_id, id);

            CREATE TABLE message_reactions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(message_id, user_id, emoji)
            );

            CREATE INDEX idx_reactions_message
                ON message_reactions(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
