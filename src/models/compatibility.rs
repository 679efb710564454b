use serde::{Deserialize, Serialize};

/// Ordered severity of a compatibility issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    None,
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityIssue {
    pub severity: WarningLevel,
    pub description: String,
    pub suggested_resolution: String,
}

/// Outcome of evaluating a release descriptor against the running
/// environment. `can_proceed` is derived, not stored: no caller can
/// override a critical block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    pub is_compatible: bool,
    pub warning_level: WarningLevel,
    pub issues: Vec<CompatibilityIssue>,
}

impl CompatibilityReport {
    pub fn new(issues: Vec<CompatibilityIssue>) -> Self {
        let warning_level = issues
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(WarningLevel::None);
        Self {
            is_compatible: warning_level < WarningLevel::Critical,
            warning_level,
            issues,
        }
    }

    /// False whenever any issue is critical, true otherwise; warnings and
    /// informational notices do not block.
    pub fn can_proceed(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == WarningLevel::Critical)
    }

    /// Human-readable issue descriptions, most severe first.
    pub fn blocking_reasons(&self) -> Vec<String> {
        let mut sorted: Vec<&CompatibilityIssue> = self.issues.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
        sorted.iter().map(|i| i.description.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: WarningLevel) -> CompatibilityIssue {
        CompatibilityIssue {
            severity,
            description: "test".to_string(),
            suggested_resolution: "test".to_string(),
        }
    }

    #[test]
    fn empty_report_proceeds() {
        let report = CompatibilityReport::new(vec![]);
        assert_eq!(report.warning_level, WarningLevel::None);
        assert!(report.is_compatible);
        assert!(report.can_proceed());
    }

    #[test]
    fn warnings_do_not_block() {
        let report = CompatibilityReport::new(vec![
            issue(WarningLevel::Info),
            issue(WarningLevel::Warning),
        ]);
        assert_eq!(report.warning_level, WarningLevel::Warning);
        assert!(report.can_proceed());
    }

    #[test]
    fn any_critical_blocks_regardless_of_others() {
        let report = CompatibilityReport::new(vec![
            issue(WarningLevel::Info),
            issue(WarningLevel::Critical),
            issue(WarningLevel::Warning),
        ]);
        assert_eq!(report.warning_level, WarningLevel::Critical);
        assert!(!report.is_compatible);
        assert!(!report.can_proceed());
    }

    #[test]
    fn severity_is_totally_ordered() {
        assert!(WarningLevel::None < WarningLevel::Info);
        assert!(WarningLevel::Info < WarningLevel::Warning);
        assert!(WarningLevel::Warning < WarningLevel::Critical);
    }
}
