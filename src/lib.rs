pub mod config;
pub mod db;
pub mod executor;
pub mod models;
pub mod scheduler;
pub mod updates;
pub mod utils;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

pub use config::EngineConfig;
pub use executor::{PipelineOutcome, run_update_pipeline};
pub use models::{
    CompatibilityReport, DownloadProgress, DownloadSession, EngineEvent, ReleaseChannel,
    ReleaseDescriptor, UpdateHistoryEntry, UpdatePolicy,
};
pub use scheduler::{CheckOutcome, UpdateScheduler};
pub use utils::{UpdateError, UpdateResult};

use db::Database;
use executor::download::DownloadManager;
use executor::restart::RestartOrchestrator;
use executor::PipelineContext;
use models::{ChannelSink, UpdateType};
use updates::release_feed::HttpReleaseFeed;

/// Install the logging backend. Call once at host startup; subsequent
/// calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Facade wiring the update engine together for the host application:
/// persistent store, HTTP feed, download manager, restart orchestration
/// and the background scheduler.
pub struct UpdateEngine {
    ctx: PipelineContext,
    scheduler: UpdateScheduler,
    events: Option<mpsc::UnboundedReceiver<EngineEvent>>,
}

impl UpdateEngine {
    pub fn new(config: EngineConfig) -> UpdateResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let config = Arc::new(config);
        let db = Arc::new(Mutex::new(Database::new(&config.db_path())?));
        let client = utils::http_client::create_http_client();
        let feed = Arc::new(HttpReleaseFeed::new(client.clone(), &config.feed_url)?);

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelSink(tx));

        let ctx = PipelineContext {
            downloads: Arc::new(DownloadManager::new(client, config.downloads_dir())),
            restarter: Arc::new(RestartOrchestrator::new(&config)),
            db,
            sink,
            config,
        };

        let scheduler = UpdateScheduler::new(ctx.clone(), feed);

        Ok(Self {
            ctx,
            scheduler,
            events: Some(rx),
        })
    }

    /// Take the event stream. The host drains this to render
    /// notifications and progress; the engine never renders anything.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take()
    }

    /// Start the background check loop.
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Stop the background loop, waiting for the current tick to finish.
    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
    }

    /// Explicit user-triggered check.
    pub async fn check_now(&self) -> UpdateResult<CheckOutcome> {
        self.scheduler.check_now().await
    }

    /// Explicit user action on an announced update: run the full
    /// download → verify → install → restart pipeline for it.
    pub async fn apply_pending_update(&self) -> UpdateResult<PipelineOutcome> {
        self.scheduler.apply_pending_update().await
    }

    /// Cooperatively cancel an in-flight download.
    pub fn cancel_download(&self, session_id: u64) -> bool {
        self.scheduler.cancel_download(session_id)
    }

    pub async fn policy(&self) -> UpdatePolicy {
        self.ctx.db.lock().await.load_policy()
    }

    /// Persist preference changes made through the host UI.
    pub async fn set_policy(&self, policy: &UpdatePolicy) -> UpdateResult<()> {
        self.ctx.db.lock().await.save_policy(policy)
    }

    pub async fn update_history(&self, limit: i64) -> UpdateResult<Vec<UpdateHistoryEntry>> {
        self.ctx.db.lock().await.get_update_history(limit)
    }

    /// Whether the running version has a successfully installed successor
    /// waiting on a restart.
    pub async fn restart_pending(&self) -> bool {
        let db = self.ctx.db.lock().await;
        db.get_update_history(1)
            .map(|entries| {
                entries
                    .first()
                    .map(|e| e.update_type == UpdateType::Installation && e.success)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}
