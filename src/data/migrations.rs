use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS bookmarks (
    id TEXT PRIMARY KEY NOT NULL,
    path TEXT NOT NULL,
    file_type TEXT NOT NULL,
    user TEXT NOT NULL,
    collection TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'default',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (user, path, collection, category)
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_user_path ON bookmarks(user, path);
CREATE INDEX IF NOT EXISTS idx_bookmarks_user_collection ON bookmarks(user, collection);
";

/// Creates the bookmark schema if missing. In-memory stores report their
/// journal mode as `memory` and keep it.
pub fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    log::debug!("bookmark store journal mode: {mode}");
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}
