use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Full,
    Differential,
    Installation,
    Rollback,
}

impl UpdateType {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateType::Full => "full",
            UpdateType::Differential => "differential",
            UpdateType::Installation => "installation",
            UpdateType::Rollback => "rollback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(UpdateType::Full),
            "differential" => Some(UpdateType::Differential),
            "installation" => Some(UpdateType::Installation),
            "rollback" => Some(UpdateType::Rollback),
            _ => None,
        }
    }
}

/// Append-only audit record, written at the terminal state of every
/// pipeline attempt and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistoryEntry {
    pub id: i64,
    pub version: String,
    pub update_type: UpdateType,
    pub success: bool,
    pub error_message: Option<String>,
    pub download_size_bytes: u64,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_type_round_trip() {
        for t in [
            UpdateType::Full,
            UpdateType::Differential,
            UpdateType::Installation,
            UpdateType::Rollback,
        ] {
            assert_eq!(UpdateType::from_str(t.as_str()), Some(t));
        }
        assert!(UpdateType::from_str("partial").is_none());
    }
}
