use crate::db::Database;
use crate::utils::UpdateResult;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    "
    CREATE TABLE IF NOT EXISTS update_history (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        version             TEXT NOT NULL,
        update_type         TEXT NOT NULL,
        success             INTEGER NOT NULL,
        error_message       TEXT,
        download_size_bytes INTEGER NOT NULL DEFAULT 0,
        timestamp           TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS settings (
        key         TEXT PRIMARY KEY,
        value       TEXT NOT NULL,
        updated_at  TEXT DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_update_history_version ON update_history(version);
    ",
];

pub fn run_migrations(db: &mut Database) -> UpdateResult<()> {
    db.conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let applied: i64 = db
        .conn
        .query_row("SELECT COALESCE(MAX(id), 0) FROM _migrations", [], |row| {
            row.get(0)
        })?;

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i64;
        if version > applied {
            db.conn.execute_batch(migration)?;
            db.conn
                .execute("INSERT INTO _migrations (id) VALUES (?1)", [version])?;
            log::info!("Applied migration {}", version);
        }
    }

    Ok(())
}
