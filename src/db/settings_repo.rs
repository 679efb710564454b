use crate::db::Database;
use crate::models::UpdatePolicy;
use crate::utils::UpdateResult;

const POLICY_KEY: &str = "update_policy";

impl Database {
    /// Load the update policy, falling back to defaults when the row is
    /// missing or unparseable (a corrupt blob must not wedge the engine).
    pub fn load_policy(&self) -> UpdatePolicy {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [POLICY_KEY],
                |row| row.get(0),
            )
            .ok();

        match json {
            Some(j) => serde_json::from_str(&j).unwrap_or_default(),
            None => UpdatePolicy::default(),
        }
    }

    pub fn save_policy(&self, policy: &UpdatePolicy) -> UpdateResult<()> {
        let json = serde_json::to_string(policy)
            .map_err(|e| crate::utils::UpdateError::Custom(format!("policy serialize: {}", e)))?;
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            rusqlite::params![POLICY_KEY, json],
        )?;
        Ok(())
    }
}
