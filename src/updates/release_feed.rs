use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::models::{Checksum, ReleaseChannel, ReleaseDescriptor};
use crate::updates::version_compare;
use crate::utils::{UpdateError, UpdateResult};

/// Source of release metadata. The production implementation talks HTTP;
/// tests substitute their own.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Latest release published on `channel`, or None when the channel has
    /// no releases yet.
    async fn latest(&self, channel: ReleaseChannel) -> UpdateResult<Option<ReleaseDescriptor>>;
}

pub struct HttpReleaseFeed {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpReleaseFeed {
    pub fn new(client: reqwest::Client, base_url: &str) -> UpdateResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UpdateError::Feed(format!("invalid feed URL {:?}: {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn latest(&self, channel: ReleaseChannel) -> UpdateResult<Option<ReleaseDescriptor>> {
        let url = self
            .base_url
            .join(&format!("channels/{}/latest", channel.as_str()))
            .map_err(|e| UpdateError::Feed(format!("feed URL join: {}", e)))?;

        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(UpdateError::Feed(format!(
                "feed returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_descriptor(&body, channel).map(Some)
    }
}

/// Wire shape of the feed payload. Everything is loose here: the feed is
/// untrusted input, so numbers and booleans may arrive as strings and are
/// coerced explicitly before anything downstream sees them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDescriptor {
    version: String,
    release_channel: String,
    artifact_size_bytes: serde_json::Value,
    checksum: String,
    download_url: String,
    is_mandatory: serde_json::Value,
    minimum_runtime_version: String,
    release_notes: Option<String>,
}

pub(crate) fn parse_descriptor(
    body: &str,
    requested_channel: ReleaseChannel,
) -> UpdateResult<ReleaseDescriptor> {
    let raw: RawDescriptor = serde_json::from_str(body)
        .map_err(|e| UpdateError::Feed(format!("unparseable release payload: {}", e)))?;

    let version = raw.version.trim().to_string();
    if !version_compare::is_valid_version_format(&version) {
        return Err(UpdateError::Feed(format!(
            "release version {:?} is not a valid version string",
            version
        )));
    }

    let channel = ReleaseChannel::from_str(&raw.release_channel).unwrap_or_else(|| {
        log::warn!(
            "Feed reported unknown channel {:?}; assuming {}",
            raw.release_channel,
            requested_channel.as_str()
        );
        requested_channel
    });

    let artifact_size_bytes = coerce_u64(&raw.artifact_size_bytes).ok_or_else(|| {
        UpdateError::Feed(format!(
            "bad artifactSizeBytes: {}",
            raw.artifact_size_bytes
        ))
    })?;

    let checksum = Checksum::parse(&raw.checksum)?;

    let download_url = raw.download_url.trim().to_string();
    Url::parse(&download_url)
        .map_err(|e| UpdateError::Feed(format!("bad downloadUrl {:?}: {}", download_url, e)))?;

    let minimum_runtime_version = if raw.minimum_runtime_version.trim().is_empty() {
        "0.0.0".to_string()
    } else {
        raw.minimum_runtime_version.trim().to_string()
    };

    Ok(ReleaseDescriptor {
        version,
        channel,
        artifact_size_bytes,
        checksum,
        download_url,
        is_mandatory: coerce_bool(&raw.is_mandatory),
        minimum_runtime_version,
        release_notes: raw.release_notes,
    })
}

fn coerce_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => matches!(s.trim(), "true" | "1" | "yes"),
        serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(version: &str, checksum: &str) -> String {
        format!(
            r#"{{
                "version": "{version}",
                "releaseChannel": "stable",
                "artifactSizeBytes": 10485760,
                "checksum": "{checksum}",
                "downloadUrl": "https://releases.example.com/tradepost-{version}.zip",
                "isMandatory": false,
                "minimumRuntimeVersion": "1.70.0",
                "releaseNotes": "Bug fixes"
            }}"#
        )
    }

    fn good_checksum() -> String {
        format!("sha256:{}", "ab".repeat(32))
    }

    #[test]
    fn parses_well_formed_payload() {
        let desc = parse_descriptor(&payload("2.1.0", &good_checksum()), ReleaseChannel::Stable)
            .unwrap();
        assert_eq!(desc.version, "2.1.0");
        assert_eq!(desc.channel, ReleaseChannel::Stable);
        assert_eq!(desc.artifact_size_bytes, 10_485_760);
        assert!(!desc.is_mandatory);
        assert_eq!(desc.minimum_runtime_version, "1.70.0");
    }

    #[test]
    fn coerces_stringly_typed_fields() {
        let body = r#"{
            "version": "2.1.0",
            "releaseChannel": "beta",
            "artifactSizeBytes": "2048",
            "checksum": "CHECKSUM",
            "downloadUrl": "https://releases.example.com/a.zip",
            "isMandatory": "true",
            "minimumRuntimeVersion": ""
        }"#
        .replace("CHECKSUM", &good_checksum());

        let desc = parse_descriptor(&body, ReleaseChannel::Beta).unwrap();
        assert_eq!(desc.artifact_size_bytes, 2048);
        assert!(desc.is_mandatory);
        assert_eq!(desc.minimum_runtime_version, "0.0.0");
        assert_eq!(desc.channel, ReleaseChannel::Beta);
    }

    #[test]
    fn rejects_bad_version() {
        let err = parse_descriptor(&payload("not-a-version", &good_checksum()), ReleaseChannel::Stable)
            .unwrap_err();
        assert!(matches!(err, UpdateError::Feed(_)));
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = parse_descriptor(&payload("2.1.0", "md5:abcd"), ReleaseChannel::Stable)
            .unwrap_err();
        assert!(matches!(err, UpdateError::Feed(_)));
    }

    #[test]
    fn rejects_negative_size() {
        let body = payload("2.1.0", &good_checksum()).replace("10485760", "-5");
        assert!(parse_descriptor(&body, ReleaseChannel::Stable).is_err());
    }

    #[test]
    fn unknown_channel_falls_back_to_requested() {
        let body = payload("2.1.0", &good_checksum()).replace("\"stable\"", "\"canary\"");
        let desc = parse_descriptor(&body, ReleaseChannel::Nightly).unwrap();
        assert_eq!(desc.channel, ReleaseChannel::Nightly);
    }
}
