use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn as_str(&self) -> &str {
        match self {
            DownloadState::Pending => "pending",
            DownloadState::Active => "active",
            DownloadState::Paused => "paused",
            DownloadState::Completed => "completed",
            DownloadState::Failed => "failed",
            DownloadState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Completed | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

/// One in-flight artifact transfer. `downloaded_bytes` only ever grows
/// while the session is active; a retry attempt opens a fresh byte count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSession {
    pub session_id: u64,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub state: DownloadState,
    pub speed_bytes_per_sec: f64,
}

impl DownloadSession {
    pub fn new(session_id: u64, total_bytes: u64) -> Self {
        Self {
            session_id,
            total_bytes,
            downloaded_bytes: 0,
            state: DownloadState::Pending,
            speed_bytes_per_sec: 0.0,
        }
    }

    pub fn record_chunk(&mut self, chunk_len: u64, speed_bytes_per_sec: f64) {
        self.downloaded_bytes += chunk_len;
        self.speed_bytes_per_sec = speed_bytes_per_sec;
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.downloaded_bytes)
    }

    pub fn progress(&self) -> DownloadProgress {
        DownloadProgress {
            downloaded_bytes: self.downloaded_bytes,
            total_bytes: self.total_bytes,
            speed_bytes_per_sec: self.speed_bytes_per_sec,
        }
    }
}

/// Snapshot delivered to progress observers on each received chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_bytes_per_sec: f64,
}

impl DownloadProgress {
    /// Estimated seconds until completion; undefined at zero speed.
    pub fn eta_seconds(&self) -> Option<f64> {
        if self.speed_bytes_per_sec <= 0.0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.downloaded_bytes);
        Some(remaining as f64 / self.speed_bytes_per_sec)
    }
}
