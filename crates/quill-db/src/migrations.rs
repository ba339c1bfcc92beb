use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'user',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS notes (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL DEFAULT '',
            tags        TEXT NOT NULL DEFAULT '',
            owner_id    TEXT NOT NULL REFERENCES users(id),
            is_pinned   INTEGER NOT NULL DEFAULT 0,
            share_token TEXT UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notes_owner
            ON notes(owner_id);

        CREATE TABLE IF NOT EXISTS collaborators (
            note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            permission  TEXT NOT NULL DEFAULT 'viewer',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(note_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_collaborators_user
            ON collaborators(user_id);

        CREATE TABLE IF NOT EXISTS activity_log (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            note_id     TEXT REFERENCES notes(id) ON DELETE SET NULL,
            action      TEXT NOT NULL,
            details     TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_activity_note
            ON activity_log(note_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
