use serde::{Deserialize, Serialize};

use crate::utils::{UpdateError, UpdateResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseChannel {
    Stable,
    Beta,
    Nightly,
    Alpha,
}

impl ReleaseChannel {
    pub fn as_str(&self) -> &str {
        match self {
            ReleaseChannel::Stable => "stable",
            ReleaseChannel::Beta => "beta",
            ReleaseChannel::Nightly => "nightly",
            ReleaseChannel::Alpha => "alpha",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Some(ReleaseChannel::Stable),
            "beta" => Some(ReleaseChannel::Beta),
            "nightly" => Some(ReleaseChannel::Nightly),
            "alpha" => Some(ReleaseChannel::Alpha),
            _ => None,
        }
    }
}

/// Algorithm-tagged artifact digest, e.g. `sha256:<64 hex chars>`.
///
/// SHA-256 is the only accepted algorithm; anything else is rejected at
/// parse time so a bad feed can never downgrade verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: String,
    pub digest: String,
}

impl Checksum {
    pub fn parse(tagged: &str) -> UpdateResult<Self> {
        let (algorithm, digest) = tagged
            .split_once(':')
            .ok_or_else(|| UpdateError::Feed(format!("untagged checksum: {:?}", tagged)))?;

        if algorithm != "sha256" {
            return Err(UpdateError::Feed(format!(
                "unsupported checksum algorithm: {:?}",
                algorithm
            )));
        }

        let digest = digest.trim().to_lowercase();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(UpdateError::Feed(format!(
                "malformed sha256 digest: {:?}",
                digest
            )));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            digest,
        })
    }

    pub fn matches(&self, computed_hex: &str) -> bool {
        self.digest == computed_hex.to_lowercase()
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

/// Metadata for one candidate release, as returned by the release feed.
///
/// Constructed from a single update-check response and never mutated; a
/// fresh check yields a fresh descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDescriptor {
    pub version: String,
    pub channel: ReleaseChannel,
    pub artifact_size_bytes: u64,
    pub checksum: Checksum,
    pub download_url: String,
    pub is_mandatory: bool,
    pub minimum_runtime_version: String,
    pub release_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_sha256() {
        let hex = "a".repeat(64);
        let c = Checksum::parse(&format!("sha256:{}", hex)).unwrap();
        assert_eq!(c.algorithm, "sha256");
        assert_eq!(c.digest, hex);
        assert!(c.matches(&hex.to_uppercase()));
    }

    #[test]
    fn rejects_other_algorithms() {
        let hex = "a".repeat(64);
        assert!(Checksum::parse(&format!("md5:{}", hex)).is_err());
        assert!(Checksum::parse(&hex).is_err());
    }

    #[test]
    fn rejects_malformed_digest() {
        assert!(Checksum::parse("sha256:zzzz").is_err());
        assert!(Checksum::parse("sha256:").is_err());
    }

    #[test]
    fn channel_round_trip() {
        for c in ["stable", "beta", "nightly", "alpha"] {
            assert_eq!(ReleaseChannel::from_str(c).unwrap().as_str(), c);
        }
        assert!(ReleaseChannel::from_str("canary").is_none());
    }
}
