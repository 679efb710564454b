use std::collections::VecDeque;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::models::{DownloadProgress, DownloadSession, DownloadState, ReleaseDescriptor};
use crate::updates::compatibility::required_disk_bytes;
use crate::utils::{disk, UpdateError, UpdateResult};

/// Ceiling on transfer attempts for a single download request.
const MAX_ATTEMPTS: u32 = 3;
/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);
/// A chunk read exceeding this counts as a transient failure.
const CHUNK_TIMEOUT: Duration = Duration::from_secs(30);
/// Trailing window over which the transfer rate is smoothed.
const SPEED_WINDOW: Duration = Duration::from_secs(3);
/// Minimum spacing between progress emissions.
const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_millis(150);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// At most one transfer may be active engine-wide.
static TRANSFER_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn is_transfer_active() -> bool {
    TRANSFER_ACTIVE.load(Ordering::SeqCst)
}

/// The active-transfer flag is engine-wide, so tests that exercise
/// `start_download` serialize on this to avoid tripping each other.
#[cfg(test)]
pub(crate) fn test_transfer_gate() -> &'static std::sync::Mutex<()> {
    static GATE: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GATE.get_or_init(|| std::sync::Mutex::new(()))
}

struct ActiveGuard;

impl ActiveGuard {
    fn acquire() -> Option<Self> {
        TRANSFER_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ActiveGuard)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        TRANSFER_ACTIVE.store(false, Ordering::SeqCst);
    }
}

pub type ProgressFn = dyn Fn(DownloadProgress) + Send + Sync;

/// Terminal result of `start_download`. `artifact_path` is present only
/// when the session completed; a cancelled session leaves nothing behind.
#[derive(Debug)]
pub struct FinishedDownload {
    pub session: DownloadSession,
    pub artifact_path: Option<PathBuf>,
}

enum TransferEnd {
    Completed,
    Cancelled,
}

pub struct DownloadManager {
    client: reqwest::Client,
    downloads_dir: PathBuf,
    current: Mutex<Option<(u64, Arc<AtomicBool>)>>,
}

impl DownloadManager {
    pub fn new(client: reqwest::Client, downloads_dir: PathBuf) -> Self {
        Self {
            client,
            downloads_dir,
            current: Mutex::new(None),
        }
    }

    /// Request cooperative cancellation of the given session. The flag is
    /// observed between chunk reads, so the stop is not instantaneous.
    pub fn cancel(&self, session_id: u64) -> bool {
        let current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match current.as_ref() {
            Some((id, flag)) if *id == session_id => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Fetch the descriptor's artifact into the downloads directory.
    ///
    /// Fails with `DiskSpace` before any network I/O when free space is
    /// under 110% of the artifact size. Transient network failures retry
    /// up to the attempt ceiling, each retry restarting from byte zero.
    pub async fn start_download(
        &self,
        descriptor: &ReleaseDescriptor,
        on_progress: &ProgressFn,
    ) -> UpdateResult<FinishedDownload> {
        let _active = ActiveGuard::acquire().ok_or_else(|| {
            UpdateError::Custom("another download is already active".to_string())
        })?;

        std::fs::create_dir_all(&self.downloads_dir)?;

        let required = required_disk_bytes(descriptor.artifact_size_bytes);
        let available = disk::available_disk_space(&self.downloads_dir)?;
        if available < required {
            return Err(UpdateError::DiskSpace {
                required,
                available,
            });
        }

        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            *current = Some((session_id, cancel.clone()));
        }

        let mut session = DownloadSession::new(session_id, descriptor.artifact_size_bytes);
        let temp_path = self.downloads_dir.join(format!(
            "tradepost-update-{}-{}.partial",
            descriptor.version, session_id
        ));

        let result = self
            .download_with_retries(descriptor, &temp_path, &mut session, &cancel, on_progress)
            .await;

        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            *current = None;
        }

        match result {
            Ok(TransferEnd::Completed) => {
                session.state = DownloadState::Completed;
                log::info!(
                    "Download of {} complete ({} bytes, session {})",
                    descriptor.version,
                    session.downloaded_bytes,
                    session_id
                );
                Ok(FinishedDownload {
                    session,
                    artifact_path: Some(temp_path),
                })
            }
            Ok(TransferEnd::Cancelled) => {
                let _ = std::fs::remove_file(&temp_path);
                session.state = DownloadState::Cancelled;
                log::info!("Download session {} cancelled", session_id);
                Ok(FinishedDownload {
                    session,
                    artifact_path: None,
                })
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                session.state = DownloadState::Failed;
                Err(e)
            }
        }
    }

    async fn download_with_retries(
        &self,
        descriptor: &ReleaseDescriptor,
        temp_path: &Path,
        session: &mut DownloadSession,
        cancel: &AtomicBool,
        on_progress: &ProgressFn,
    ) -> UpdateResult<TransferEnd> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            // No resume support: every attempt truncates and starts over.
            session.downloaded_bytes = 0;
            session.speed_bytes_per_sec = 0.0;
            session.state = DownloadState::Active;

            match self
                .transfer_once(descriptor, temp_path, session, cancel, on_progress)
                .await
            {
                Ok(end) => return Ok(end),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "Download attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        MAX_ATTEMPTS,
                        descriptor.version,
                        e,
                        RETRY_DELAY
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn transfer_once(
        &self,
        descriptor: &ReleaseDescriptor,
        temp_path: &Path,
        session: &mut DownloadSession,
        cancel: &AtomicBool,
        on_progress: &ProgressFn,
    ) -> UpdateResult<TransferEnd> {
        let response = self
            .client
            .get(&descriptor.download_url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = std::fs::File::create(temp_path)?;
        let mut stream = response.bytes_stream();
        let mut speed = SpeedWindow::new();
        let mut last_emit: Option<Instant> = None;

        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(TransferEnd::Cancelled);
            }

            let chunk = match tokio::time::timeout(CHUNK_TIMEOUT, stream.next()).await {
                Err(_) => return Err(UpdateError::Timeout),
                Ok(None) => break,
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(e.into()),
            };

            file.write_all(&chunk)?;

            let now = Instant::now();
            let rate = speed.record(now, chunk.len() as u64);
            session.record_chunk(chunk.len() as u64, rate);

            let due = last_emit
                .map(|t| t.elapsed() >= PROGRESS_EMIT_INTERVAL)
                .unwrap_or(true);
            if due {
                last_emit = Some(now);
                on_progress(session.progress());
            }
        }

        file.flush()?;
        drop(file);
        on_progress(session.progress());
        Ok(TransferEnd::Completed)
    }
}

/// Smoothed transfer rate over a short trailing window of chunk arrivals.
struct SpeedWindow {
    samples: VecDeque<(Instant, u64)>,
}

impl SpeedWindow {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    fn record(&mut self, now: Instant, bytes: u64) -> f64 {
        self.samples.push_back((now, bytes));
        while let Some(&(t, _)) = self.samples.front() {
            if now.duration_since(t) > SPEED_WINDOW {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        let oldest = match self.samples.front() {
            Some(&(t, _)) => t,
            None => return 0.0,
        };
        let elapsed = now.duration_since(oldest).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let total: u64 = self.samples.iter().map(|&(_, b)| b).sum();
        total as f64 / elapsed
    }
}
