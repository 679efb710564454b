use crate::db::Database;
use crate::models::{UpdateHistoryEntry, UpdateType};
use crate::utils::UpdateResult;

impl Database {
    /// Append a terminal-state record. History rows are never updated or
    /// deleted afterwards.
    pub fn record_history(
        &self,
        version: &str,
        update_type: UpdateType,
        success: bool,
        error_message: Option<&str>,
        download_size_bytes: u64,
    ) -> UpdateResult<i64> {
        self.conn.execute(
            "INSERT INTO update_history (version, update_type, success, error_message, download_size_bytes, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                version,
                update_type.as_str(),
                success as i32,
                error_message,
                download_size_bytes as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_update_history(&self, limit: i64) -> UpdateResult<Vec<UpdateHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, version, update_type, success, error_message, download_size_bytes, timestamp
             FROM update_history
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map([limit], |row| {
                let update_type: String = row.get(2)?;
                let size: i64 = row.get(5)?;
                Ok(UpdateHistoryEntry {
                    id: row.get(0)?,
                    version: row.get(1)?,
                    update_type: UpdateType::from_str(&update_type).unwrap_or(UpdateType::Full),
                    success: row.get::<_, i32>(3)? != 0,
                    error_message: row.get(4)?,
                    download_size_bytes: size.max(0) as u64,
                    timestamp: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(entries)
    }

    /// Whether an install of `version` has ever been recorded as successful.
    pub fn has_installed(&self, version: &str) -> UpdateResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM update_history
             WHERE version = ?1 AND update_type = 'installation' AND success = 1",
            [version],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_append_only_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.record_history("2.1.0", UpdateType::Full, true, None, 1024)
            .unwrap();
        db.record_history("2.1.0", UpdateType::Installation, true, None, 0)
            .unwrap();
        db.record_history("2.2.0", UpdateType::Full, false, Some("network down"), 0)
            .unwrap();

        let entries = db.get_update_history(10).unwrap();
        assert_eq!(entries.len(), 3);
        // Most recent first
        assert_eq!(entries[0].version, "2.2.0");
        assert!(!entries[0].success);
        assert_eq!(entries[0].error_message.as_deref(), Some("network down"));
        assert_eq!(entries[2].download_size_bytes, 1024);
    }

    #[test]
    fn has_installed_only_counts_successful_installs() {
        let db = Database::open_in_memory().unwrap();
        db.record_history("3.0.0", UpdateType::Full, true, None, 10)
            .unwrap();
        assert!(!db.has_installed("3.0.0").unwrap());

        db.record_history("3.0.0", UpdateType::Installation, false, Some("swap failed"), 0)
            .unwrap();
        assert!(!db.has_installed("3.0.0").unwrap());

        db.record_history("3.0.0", UpdateType::Installation, true, None, 0)
            .unwrap();
        assert!(db.has_installed("3.0.0").unwrap());
    }
}
