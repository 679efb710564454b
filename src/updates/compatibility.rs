use std::cmp::Ordering;
use std::path::Path;

use crate::models::{CompatibilityIssue, CompatibilityReport, ReleaseDescriptor, WarningLevel};
use crate::updates::version_compare;
use crate::utils::disk;

/// Operating systems the release pipeline produces artifacts for.
/// Anything else has historically worked but is unsupported.
const SUPPORTED_OS: &[&str] = &["linux", "macos", "windows"];

/// Facts about the running host, gathered once per check.
#[derive(Debug, Clone)]
pub struct EnvironmentFacts {
    pub runtime_version: String,
    pub os_name: String,
    pub os_version: String,
    pub available_disk_bytes: u64,
}

impl EnvironmentFacts {
    pub fn gather(runtime_version: &str, disk_probe_path: &Path) -> Self {
        let available_disk_bytes = disk::available_disk_space(disk_probe_path).unwrap_or(0);
        Self {
            runtime_version: runtime_version.to_string(),
            os_name: std::env::consts::OS.to_string(),
            os_version: std::env::consts::ARCH.to_string(),
            available_disk_bytes,
        }
    }
}

/// Evaluate a candidate release against the running environment.
///
/// The report this returns is the single authoritative gate the scheduler
/// consults before any network or disk work happens.
pub fn evaluate(descriptor: &ReleaseDescriptor, env: &EnvironmentFacts) -> CompatibilityReport {
    let mut issues = Vec::new();

    match compare_runtime(&env.runtime_version, &descriptor.minimum_runtime_version) {
        Ordering::Less => issues.push(CompatibilityIssue {
            severity: WarningLevel::Critical,
            description: format!(
                "Runtime {} is below the minimum {} required by release {}",
                env.runtime_version, descriptor.minimum_runtime_version, descriptor.version
            ),
            suggested_resolution: format!(
                "Upgrade the runtime to {} or newer before updating",
                descriptor.minimum_runtime_version
            ),
        }),
        Ordering::Equal => issues.push(CompatibilityIssue {
            severity: WarningLevel::Info,
            description: format!(
                "Runtime {} is the oldest this release supports",
                env.runtime_version
            ),
            suggested_resolution: "A newer runtime is recommended".to_string(),
        }),
        Ordering::Greater => {}
    }

    if !SUPPORTED_OS.contains(&env.os_name.as_str()) {
        issues.push(CompatibilityIssue {
            severity: WarningLevel::Warning,
            description: format!("{} is not an officially supported operating system", env.os_name),
            suggested_resolution: "Updates have historically worked here but are untested"
                .to_string(),
        });
    }

    // Advisory only; the download manager enforces the hard margin before
    // any network I/O.
    let required = required_disk_bytes(descriptor.artifact_size_bytes);
    if env.available_disk_bytes < required {
        issues.push(CompatibilityIssue {
            severity: WarningLevel::Warning,
            description: format!(
                "Free disk space ({} bytes) is below the {} bytes needed for this download",
                env.available_disk_bytes, required
            ),
            suggested_resolution: format!(
                "Free at least {} bytes and try again",
                required - env.available_disk_bytes
            ),
        });
    }

    let report = CompatibilityReport::new(issues);
    log::debug!(
        "Compatibility for {}: level={:?} proceed={}",
        descriptor.version,
        report.warning_level,
        report.can_proceed()
    );
    report
}

/// Artifact size plus a 10% safety margin.
pub fn required_disk_bytes(artifact_size_bytes: u64) -> u64 {
    artifact_size_bytes.saturating_add(artifact_size_bytes / 10)
}

/// Runtime versions are semver when well-formed; fall back to the lenient
/// component comparison otherwise.
fn compare_runtime(current: &str, minimum: &str) -> Ordering {
    if let (Ok(cur), Ok(min)) = (semver::Version::parse(current), semver::Version::parse(minimum)) {
        return cur.cmp(&min);
    }
    version_compare::compare(current, minimum)
}
