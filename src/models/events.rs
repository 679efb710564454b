use serde::{Deserialize, Serialize};

use crate::models::DownloadProgress;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailable {
    pub version: String,
    pub is_mandatory: bool,
    pub release_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlocked {
    pub version: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstalled {
    pub version: String,
    pub restarting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailed {
    pub version: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartPending {
    pub version: String,
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFailed {
    pub message: String,
}

/// Everything the engine tells the outside world. The UI layer consumes
/// these; the engine never renders anything itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    UpdateAvailable(UpdateAvailable),
    UpdateBlocked(UpdateBlocked),
    DownloadProgress(DownloadProgress),
    UpdateInstalled(UpdateInstalled),
    UpdateFailed(UpdateFailed),
    RestartPending(RestartPending),
    CheckFailed(CheckFailed),
}

/// Notification sink consumed by the host application. Delivery may happen
/// on a different execution context than the caller's; implementations
/// must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events into an unbounded channel for the host to drain.
pub struct ChannelSink(pub tokio::sync::mpsc::UnboundedSender<EngineEvent>);

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.0.send(event);
    }
}

/// Drops every event; used where no observer is attached.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
