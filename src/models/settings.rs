use serde::{Deserialize, Serialize};

/// User-configurable update behavior, persisted as a JSON blob in the
/// settings table and hot-reloaded by the scheduler each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePolicy {
    pub auto_check_enabled: bool,
    pub check_interval_minutes: u32,
    pub auto_download_enabled: bool,
    pub notifications_enabled: bool,
    pub prefer_differential_updates: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            auto_check_enabled: true,
            check_interval_minutes: 60,
            auto_download_enabled: false,
            notifications_enabled: true,
            prefer_differential_updates: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_missing_fields_fall_back_to_defaults() {
        let policy: UpdatePolicy =
            serde_json::from_str(r#"{"checkIntervalMinutes": 15, "theme": "dark"}"#).unwrap();
        assert_eq!(policy.check_interval_minutes, 15);
        assert!(policy.auto_check_enabled);
        assert!(!policy.auto_download_enabled);
    }
}
