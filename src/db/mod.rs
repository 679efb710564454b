pub mod history_repo;
pub mod migrations;
pub mod settings_repo;

use rusqlite::Connection;
use std::path::Path;

use crate::utils::UpdateResult;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &Path) -> UpdateResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        migrations::run_migrations(&mut db)?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> UpdateResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        migrations::run_migrations(&mut db)?;
        Ok(db)
    }
}
