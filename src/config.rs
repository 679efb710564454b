use std::path::PathBuf;

use crate::models::ReleaseChannel;

/// Static wiring for the update engine, supplied by the host application
/// at startup. Everything user-tunable lives in `UpdatePolicy` instead.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Version of the currently-running artifact.
    pub current_version: String,
    /// Version of the host runtime, checked against a release's
    /// `minimumRuntimeVersion`.
    pub runtime_version: String,
    pub channel: ReleaseChannel,
    /// Base URL of the release metadata service.
    pub feed_url: String,
    /// On-disk path of the currently-running artifact.
    pub artifact_path: PathBuf,
    /// Launcher executable used to start the artifact. When None the
    /// artifact is launched directly.
    pub launcher_path: Option<PathBuf>,
    /// Arguments the replacement process is started with.
    pub restart_args: Vec<String>,
    /// Root for the updater database, in-progress downloads and backups.
    pub data_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(
        feed_url: impl Into<String>,
        current_version: impl Into<String>,
        artifact_path: impl Into<PathBuf>,
    ) -> Self {
        let current_version = current_version.into();
        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tradepost")
            .join("updater");
        Self {
            runtime_version: current_version.clone(),
            current_version,
            channel: ReleaseChannel::Stable,
            feed_url: feed_url.into(),
            artifact_path: artifact_path.into(),
            launcher_path: None,
            restart_args: Vec::new(),
            data_dir,
        }
    }

    pub fn channel(mut self, channel: ReleaseChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    pub fn launcher_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.launcher_path = Some(path.into());
        self
    }

    pub fn restart_args(mut self, args: Vec<String>) -> Self {
        self.restart_args = args;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("updater.db")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}
