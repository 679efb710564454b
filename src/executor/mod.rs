pub mod download;
pub mod install;
pub mod restart;
pub mod verify;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::models::{
    DownloadState, EngineEvent, EventSink, ReleaseDescriptor, RestartPending, UpdateFailed,
    UpdateInstalled, UpdateType,
};
use crate::utils::{UpdateError, UpdateResult};
use download::DownloadManager;
use install::{InstallState, Installer};
use restart::RestartOrchestrator;

/// Shared handles the pipeline and scheduler operate on.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<EngineConfig>,
    pub db: Arc<Mutex<Database>>,
    pub sink: Arc<dyn EventSink>,
    pub downloads: Arc<DownloadManager>,
    pub restarter: Arc<RestartOrchestrator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Installed { restarting: bool },
    Cancelled,
}

/// Drive one release through download, verification, install and the
/// restart handover. Every terminal state (success, failure or
/// cancellation) leaves a history record; failures additionally emit a
/// notification. Each stage gates the next: nothing downstream runs after
/// a failure.
pub async fn run_update_pipeline(
    ctx: &PipelineContext,
    descriptor: &ReleaseDescriptor,
) -> UpdateResult<PipelineOutcome> {
    let version = descriptor.version.clone();
    log::info!("Update pipeline starting for {}", version);

    let sink = ctx.sink.clone();
    let progress = move |p| sink.emit(EngineEvent::DownloadProgress(p));

    let finished = match ctx.downloads.start_download(descriptor, &progress).await {
        Ok(f) => f,
        Err(e) => {
            record_history(ctx, &version, UpdateType::Full, false, Some(&e.to_string()), 0).await;
            emit_failure(ctx, &version, &e);
            return Err(e);
        }
    };

    let artifact = match (finished.session.state, finished.artifact_path) {
        (DownloadState::Completed, Some(path)) => path,
        _ => {
            record_history(
                ctx,
                &version,
                UpdateType::Full,
                false,
                Some("cancelled before completion"),
                finished.session.downloaded_bytes,
            )
            .await;
            return Ok(PipelineOutcome::Cancelled);
        }
    };

    let download_size = finished.session.downloaded_bytes;

    if let Err(e) = verify::verify(&artifact, &descriptor.checksum) {
        record_history(
            ctx,
            &version,
            UpdateType::Full,
            false,
            Some(&e.to_string()),
            download_size,
        )
        .await;
        emit_failure(ctx, &version, &e);
        return Err(e);
    }

    record_history(ctx, &version, UpdateType::Full, true, None, download_size).await;

    let mut installer = Installer::new(
        &ctx.config.artifact_path,
        &artifact,
        ctx.config.backups_dir(),
        &ctx.config.current_version,
    );

    match installer.run().await {
        Err(e) => {
            let update_type = if installer.state() == InstallState::Restored {
                UpdateType::Rollback
            } else {
                UpdateType::Installation
            };
            record_history(ctx, &version, update_type, false, Some(&e.to_string()), 0).await;
            let _ = std::fs::remove_file(&artifact);
            emit_failure(ctx, &version, &e);
            Err(e)
        }
        Ok(()) => {
            record_history(ctx, &version, UpdateType::Installation, true, None, 0).await;
            let _ = std::fs::remove_file(&artifact);

            let restarting = hand_over(ctx, &version).await;
            ctx.sink.emit(EngineEvent::UpdateInstalled(UpdateInstalled {
                version: version.clone(),
                restarting,
            }));
            Ok(PipelineOutcome::Installed { restarting })
        }
    }
}

/// Attempt the restart handover; a refusal degrades to guidance for the
/// user rather than an error.
async fn hand_over(ctx: &PipelineContext, version: &str) -> bool {
    if !ctx.restarter.can_restart() {
        ctx.sink.emit(EngineEvent::RestartPending(RestartPending {
            version: version.to_string(),
            guidance: "Restart the application to finish the update".to_string(),
        }));
        return false;
    }

    match ctx.restarter.restart().await {
        Ok(()) => true,
        Err(UpdateError::RestartUnsupported(guidance)) => {
            log::info!("Restart unavailable for {}: {}", version, guidance);
            ctx.sink.emit(EngineEvent::RestartPending(RestartPending {
                version: version.to_string(),
                guidance,
            }));
            false
        }
        Err(e) => {
            log::warn!("Restart attempt for {} failed: {}", version, e);
            ctx.sink.emit(EngineEvent::RestartPending(RestartPending {
                version: version.to_string(),
                guidance: "Restart the application to finish the update".to_string(),
            }));
            false
        }
    }
}

async fn record_history(
    ctx: &PipelineContext,
    version: &str,
    update_type: UpdateType,
    success: bool,
    error_message: Option<&str>,
    download_size_bytes: u64,
) {
    let db = ctx.db.lock().await;
    if let Err(e) = db.record_history(version, update_type, success, error_message, download_size_bytes)
    {
        log::warn!("Failed to record history for {}: {}", version, e);
    }
}

fn emit_failure(ctx: &PipelineContext, version: &str, error: &UpdateError) {
    ctx.sink.emit(EngineEvent::UpdateFailed(UpdateFailed {
        version: version.to_string(),
        message: error.to_string(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checksum, ReleaseChannel};

    struct RecordingSink(std::sync::Mutex<Vec<EngineEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: EngineEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn context(dir: &std::path::Path) -> (PipelineContext, Arc<RecordingSink>) {
        let config = Arc::new(
            crate::config::EngineConfig::new(
                "https://feed.example.com/",
                "2.0.0",
                dir.join("tradepost.bin"),
            )
            .data_dir(dir.join("data")),
        );
        let sink = Arc::new(RecordingSink(std::sync::Mutex::new(Vec::new())));
        let downloads = Arc::new(DownloadManager::new(
            crate::utils::http_client::create_http_client(),
            config.downloads_dir(),
        ));
        let restarter = Arc::new(RestartOrchestrator::new(&config));
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        (
            PipelineContext {
                config,
                db,
                sink: sink.clone(),
                downloads,
                restarter,
            },
            sink,
        )
    }

    #[tokio::test]
    async fn failed_download_records_history_and_notifies() {
        let _gate = download::test_transfer_gate()
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let (ctx, sink) = context(dir.path());

        // A size no filesystem can satisfy fails the pipeline at the
        // disk-space gate, before any network traffic.
        let descriptor = ReleaseDescriptor {
            version: "2.1.0".to_string(),
            channel: ReleaseChannel::Stable,
            artifact_size_bytes: u64::MAX / 2,
            checksum: Checksum::parse(&format!("sha256:{}", "a".repeat(64))).unwrap(),
            download_url: "https://releases.example.com/a.zip".to_string(),
            is_mandatory: false,
            minimum_runtime_version: "0.0.0".to_string(),
            release_notes: None,
        };

        let err = run_update_pipeline(&ctx, &descriptor).await.unwrap_err();
        assert!(matches!(err, UpdateError::DiskSpace { .. }));

        let history = ctx.db.lock().await.get_update_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, "2.1.0");
        assert_eq!(history[0].update_type, UpdateType::Full);
        assert!(!history[0].success);
        assert!(history[0].error_message.is_some());

        let events = sink.0.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::UpdateFailed(_))));
    }
}
