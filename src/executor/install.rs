use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tokio::sync::Mutex;

use crate::utils::{UpdateError, UpdateResult};

/// Serializes installs and restarts engine-wide: the swap is a critical
/// section no other installer invocation or restart may overlap.
pub(crate) fn install_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Staged,
    BackingUp,
    Swapping,
    VerifiedNew,
    Committed,
    RollingBack,
    Restored,
}

/// Swaps the running artifact for a verified replacement.
///
/// The rename in the swap step is the only non-recoverable transition:
/// any failure before it leaves the original untouched, and any failure
/// after it restores the original from the backup taken first.
pub struct Installer {
    target_path: PathBuf,
    staged_artifact: PathBuf,
    backup_dir: PathBuf,
    replaced_version: String,
    state: InstallState,
    backup_path: Option<PathBuf>,
}

impl Installer {
    pub fn new(
        target_path: impl Into<PathBuf>,
        staged_artifact: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        replaced_version: impl Into<String>,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            staged_artifact: staged_artifact.into(),
            backup_dir: backup_dir.into(),
            replaced_version: replaced_version.into(),
            state: InstallState::Staged,
            backup_path: None,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    pub async fn run(&mut self) -> UpdateResult<()> {
        let _lock = install_lock().lock().await;

        self.state = InstallState::BackingUp;
        if let Err(e) = self.back_up() {
            self.abort_before_swap();
            return Err(UpdateError::InstallFailure(format!("backup failed: {}", e)));
        }

        self.state = InstallState::Swapping;
        if let Err(e) = self.swap() {
            self.abort_before_swap();
            return Err(UpdateError::InstallFailure(format!("swap failed: {}", e)));
        }

        self.state = InstallState::VerifiedNew;
        if let Err(e) = self.revalidate() {
            self.restore_from_backup()?;
            return Err(e);
        }

        self.state = InstallState::Committed;
        log::info!(
            "Installed replacement artifact over {} (backup: {:?})",
            self.target_path.display(),
            self.backup_path
        );
        Ok(())
    }

    /// Copy the running artifact aside, tagged with its version and a
    /// timestamp.
    fn back_up(&mut self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.backup_dir)?;

        let file_name = self
            .target_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        let backup = self
            .backup_dir
            .join(format!("{}-v{}-{}.bak", file_name, self.replaced_version, stamp));

        std::fs::copy(&self.target_path, &backup)?;
        self.backup_path = Some(backup);
        Ok(())
    }

    /// Stage the replacement next to the target, then rename it over the
    /// original. Everything up to the rename is recoverable.
    fn swap(&self) -> std::io::Result<()> {
        let sibling = self.sibling_path();
        if let Err(e) = std::fs::copy(&self.staged_artifact, &sibling) {
            let _ = std::fs::remove_file(&sibling);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&sibling, &self.target_path) {
            let _ = std::fs::remove_file(&sibling);
            return Err(e);
        }
        Ok(())
    }

    fn revalidate(&self) -> UpdateResult<()> {
        let metadata = std::fs::metadata(&self.target_path).map_err(|e| {
            UpdateError::InstallFailure(format!("replaced artifact unreadable: {}", e))
        })?;
        if metadata.len() == 0 {
            return Err(UpdateError::InstallFailure(
                "replaced artifact is empty".to_string(),
            ));
        }
        std::fs::File::open(&self.target_path).map_err(|e| {
            UpdateError::InstallFailure(format!("replaced artifact unreadable: {}", e))
        })?;
        Ok(())
    }

    /// Failure before the rename: nothing was destroyed, so rolling back
    /// only clears staging leftovers.
    fn abort_before_swap(&mut self) {
        self.state = InstallState::RollingBack;
        let _ = std::fs::remove_file(self.sibling_path());
        self.state = InstallState::Restored;
        log::warn!(
            "Install of replacement for {} aborted before swap; original untouched",
            self.target_path.display()
        );
    }

    /// Failure after the rename: the only path that restores file content,
    /// from the backup taken in `back_up`.
    fn restore_from_backup(&mut self) -> UpdateResult<()> {
        self.state = InstallState::RollingBack;
        let backup = self.backup_path.clone().ok_or_else(|| {
            UpdateError::InstallFailure("rollback requested but no backup exists".to_string())
        })?;

        std::fs::copy(&backup, &self.target_path).map_err(|e| {
            UpdateError::InstallFailure(format!(
                "rollback from {} failed: {}",
                backup.display(),
                e
            ))
        })?;

        self.state = InstallState::Restored;
        log::warn!(
            "Restored {} from backup {}",
            self.target_path.display(),
            backup.display()
        );
        Ok(())
    }

    fn sibling_path(&self) -> PathBuf {
        let file_name = self
            .target_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        self.target_path
            .with_file_name(format!(".{}.staged", file_name))
    }
}
