use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::executor::{self, download, PipelineContext, PipelineOutcome};
use crate::models::{
    CheckFailed, EngineEvent, ReleaseDescriptor, UpdateBlocked, UpdateAvailable, UpdatePolicy,
    UpdateType,
};
use crate::updates::release_feed::ReleaseFeed;
use crate::updates::{compatibility, version_compare};
use crate::utils::{UpdateError, UpdateResult};

/// Cadence used while a mandatory release is known but not yet installed,
/// regardless of the configured interval.
pub const MANDATORY_CHECK_INTERVAL_MINUTES: u64 = 5;

/// Downloads and backups older than this are swept on every tick.
const STALE_FILE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Automatic checking is disabled by policy.
    Disabled,
    /// The feed has no release for this channel.
    NoRelease,
    /// The running version is current (or ahead).
    UpToDate,
    /// The latest release is already installed; a restart will pick it up.
    PendingRestart,
    /// Compatibility gate refused the release.
    Blocked,
    /// An update exists and awaits explicit user action.
    Available,
    /// The download/verify/install pipeline was started in the background.
    PipelineStarted,
    /// A transfer is already active; this trigger was suppressed.
    DownloadBusy,
}

pub(crate) struct SchedulerCore {
    ctx: PipelineContext,
    feed: Arc<dyn ReleaseFeed>,
    notified_version: std::sync::Mutex<Option<String>>,
    last_descriptor: std::sync::Mutex<Option<ReleaseDescriptor>>,
    mandatory_pending: AtomicBool,
}

impl SchedulerCore {
    fn new(ctx: PipelineContext, feed: Arc<dyn ReleaseFeed>) -> Self {
        Self {
            ctx,
            feed,
            notified_version: std::sync::Mutex::new(None),
            last_descriptor: std::sync::Mutex::new(None),
            mandatory_pending: AtomicBool::new(false),
        }
    }

    async fn run_tick(self: &Arc<Self>, manual: bool) -> UpdateResult<CheckOutcome> {
        self.sweep_stale_files();

        let policy = { self.ctx.db.lock().await.load_policy() };
        if !manual && !policy.auto_check_enabled {
            return Ok(CheckOutcome::Disabled);
        }

        let descriptor = match self.feed.latest(self.ctx.config.channel).await {
            Ok(Some(d)) => d,
            Ok(None) => return Ok(CheckOutcome::NoRelease),
            Err(e) => {
                log::warn!("Update check failed: {}", e);
                if policy.notifications_enabled {
                    self.ctx.sink.emit(EngineEvent::CheckFailed(CheckFailed {
                        message: e.to_string(),
                    }));
                }
                return Err(e);
            }
        };

        if !version_compare::is_newer(&self.ctx.config.current_version, &descriptor.version) {
            // Not newer: deliberately no event and no history row.
            self.mandatory_pending.store(false, Ordering::SeqCst);
            return Ok(CheckOutcome::UpToDate);
        }

        let already_installed = {
            self.ctx
                .db
                .lock()
                .await
                .has_installed(&descriptor.version)
                .unwrap_or(false)
        };
        if already_installed {
            self.mandatory_pending.store(false, Ordering::SeqCst);
            log::debug!(
                "Release {} already installed; waiting for restart",
                descriptor.version
            );
            return Ok(CheckOutcome::PendingRestart);
        }

        self.mandatory_pending
            .store(descriptor.is_mandatory, Ordering::SeqCst);
        {
            let mut last = self
                .last_descriptor
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            *last = Some(descriptor.clone());
        }

        let env = compatibility::EnvironmentFacts::gather(
            &self.ctx.config.runtime_version,
            &self.ctx.config.data_dir,
        );
        let report = compatibility::evaluate(&descriptor, &env);
        if !report.can_proceed() {
            if self.first_notice_for(&descriptor.version) {
                let reasons = report.blocking_reasons();
                let db = self.ctx.db.lock().await;
                if let Err(e) = db.record_history(
                    &descriptor.version,
                    UpdateType::Full,
                    false,
                    Some(&format!("incompatible environment: {}", reasons.join("; "))),
                    0,
                ) {
                    log::warn!("Failed to record blocked update: {}", e);
                }
                drop(db);
                if policy.notifications_enabled {
                    self.ctx.sink.emit(EngineEvent::UpdateBlocked(UpdateBlocked {
                        version: descriptor.version.clone(),
                        reasons,
                    }));
                }
            }
            return Ok(CheckOutcome::Blocked);
        }

        if policy.auto_download_enabled || descriptor.is_mandatory {
            if download::is_transfer_active() {
                log::debug!(
                    "Download already active; suppressing trigger for {}",
                    descriptor.version
                );
                return Ok(CheckOutcome::DownloadBusy);
            }

            let core = Arc::clone(self);
            tokio::spawn(async move {
                match executor::run_update_pipeline(&core.ctx, &descriptor).await {
                    Ok(PipelineOutcome::Installed { .. }) => {
                        core.mandatory_pending.store(false, Ordering::SeqCst);
                    }
                    Ok(PipelineOutcome::Cancelled) => {
                        log::info!("Update pipeline for {} cancelled", descriptor.version);
                    }
                    Err(e) => {
                        log::warn!("Update pipeline for {} failed: {}", descriptor.version, e);
                    }
                }
            });
            return Ok(CheckOutcome::PipelineStarted);
        }

        if self.first_notice_for(&descriptor.version) && policy.notifications_enabled {
            self.ctx
                .sink
                .emit(EngineEvent::UpdateAvailable(UpdateAvailable {
                    version: descriptor.version.clone(),
                    is_mandatory: descriptor.is_mandatory,
                    release_notes: descriptor.release_notes.clone(),
                }));
        }
        Ok(CheckOutcome::Available)
    }

    /// True the first time this version is seen; later ticks stay quiet
    /// until a newer version shows up.
    fn first_notice_for(&self, version: &str) -> bool {
        let mut notified = self
            .notified_version
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if notified.as_deref() == Some(version) {
            return false;
        }
        *notified = Some(version.to_string());
        true
    }

    fn sweep_stale_files(&self) {
        let mut removed = 0usize;
        for dir in [
            self.ctx.config.downloads_dir(),
            self.ctx.config.backups_dir(),
        ] {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let stale = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .and_then(|t| t.elapsed().map_err(|_| std::io::Error::other("clock skew")))
                    .map(|age| age > STALE_FILE_RETENTION)
                    .unwrap_or(false);
                if stale && std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::info!("Swept {} stale update files", removed);
        }
    }
}

pub(crate) fn next_interval_minutes(policy: &UpdatePolicy, mandatory_pending: bool) -> u64 {
    if mandatory_pending {
        MANDATORY_CHECK_INTERVAL_MINUTES
    } else {
        policy.check_interval_minutes.max(1) as u64
    }
}

/// Owns the recurring background check. Constructed per engine instance
/// so tests get isolated schedulers instead of ambient global state.
pub struct UpdateScheduler {
    core: Arc<SchedulerCore>,
    shutdown: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl UpdateScheduler {
    pub fn new(ctx: PipelineContext, feed: Arc<dyn ReleaseFeed>) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(ctx, feed)),
            shutdown: None,
            handle: None,
        }
    }

    /// Spawn the recurring check loop. The interval is re-read from the
    /// policy store each cycle, so preference changes apply without a
    /// restart; a pending mandatory release shortens it.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            log::warn!("Update scheduler already running");
            return;
        }

        let core = Arc::clone(&self.core);
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move {
            loop {
                let minutes = {
                    let policy = core.ctx.db.lock().await.load_policy();
                    next_interval_minutes(
                        &policy,
                        core.mandatory_pending.load(Ordering::SeqCst),
                    )
                };

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(minutes * 60)) => {
                        log::info!("Running scheduled update check...");
                        match core.run_tick(false).await {
                            Ok(outcome) => log::debug!("Scheduled check: {:?}", outcome),
                            Err(e) => log::warn!("Scheduled check failed: {}", e),
                        }
                    }
                    _ = rx.recv() => break,
                }
            }
            log::info!("Update scheduler stopped");
        });

        self.shutdown = Some(tx);
        self.handle = Some(handle);
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Explicit user-triggered check; bypasses the auto-check policy gate
    /// but honors every other rule.
    pub async fn check_now(&self) -> UpdateResult<CheckOutcome> {
        self.core.run_tick(true).await
    }

    /// Explicit user action on a previously announced update: runs the
    /// full pipeline for the most recently fetched descriptor.
    pub async fn apply_pending_update(&self) -> UpdateResult<PipelineOutcome> {
        let descriptor = {
            let last = self
                .core
                .last_descriptor
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            last.clone()
        }
        .ok_or_else(|| UpdateError::Custom("no update pending".to_string()))?;

        if download::is_transfer_active() {
            return Err(UpdateError::Custom(
                "a download is already active".to_string(),
            ));
        }

        let outcome = executor::run_update_pipeline(&self.core.ctx, &descriptor).await?;
        if matches!(outcome, PipelineOutcome::Installed { .. }) {
            self.core.mandatory_pending.store(false, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    /// Cooperatively cancel an in-flight download.
    pub fn cancel_download(&self, session_id: u64) -> bool {
        self.core.ctx.downloads.cancel(session_id)
    }
}
