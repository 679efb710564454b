use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::executor::install::install_lock;
use crate::utils::{UpdateError, UpdateResult};

/// Head start granted to the replacement process before the old one exits.
const HANDOVER_GRACE: Duration = Duration::from_millis(500);

type ExitHook = Box<dyn Fn() + Send + Sync>;

/// Launches the freshly-installed artifact and retires the current
/// process, in that order, so there is always a window where both exist.
pub struct RestartOrchestrator {
    artifact_path: PathBuf,
    launcher_path: Option<PathBuf>,
    restart_args: Vec<String>,
    exit_hook: ExitHook,
}

impl RestartOrchestrator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            artifact_path: config.artifact_path.clone(),
            launcher_path: config.launcher_path.clone(),
            restart_args: config.restart_args.clone(),
            exit_hook: Box::new(|| std::process::exit(0)),
        }
    }

    /// Replace the default graceful-exit signal. The host installs its
    /// own shutdown sequence here; tests install a no-op.
    pub fn with_exit_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.exit_hook = Box::new(hook);
        self
    }

    /// True only when both the artifact and a launcher for it resolve on
    /// disk.
    pub fn can_restart(&self) -> bool {
        self.artifact_path.exists() && self.resolve_launcher().is_some()
    }

    pub async fn restart(&self) -> UpdateResult<()> {
        if is_development_run() {
            return Err(UpdateError::RestartUnsupported(
                "running from a source tree; restart manually after the update".to_string(),
            ));
        }

        let launcher = self.resolve_launcher().ok_or_else(|| {
            UpdateError::RestartUnsupported(
                "artifact or launcher path is not resolvable".to_string(),
            )
        })?;

        // No handover while an install holds the swap critical section.
        let _lock = install_lock().lock().await;

        let mut command = Command::new(&launcher);
        if launcher != self.artifact_path {
            command.arg(&self.artifact_path);
        }
        command.args(&self.restart_args);

        log::info!(
            "Relaunching via {} {:?}",
            launcher.display(),
            self.restart_args
        );
        command.spawn().map_err(|e| {
            UpdateError::RestartUnsupported(format!("failed to launch replacement: {}", e))
        })?;

        tokio::time::sleep(HANDOVER_GRACE).await;
        (self.exit_hook)();
        Ok(())
    }

    fn resolve_launcher(&self) -> Option<PathBuf> {
        match &self.launcher_path {
            Some(launcher) => launcher.exists().then(|| launcher.clone()),
            None => self
                .artifact_path
                .exists()
                .then(|| self.artifact_path.clone()),
        }
    }
}

/// A cargo target tree means a development run: process replacement is
/// reported unsupported instead of attempted.
fn is_development_run() -> bool {
    let Ok(exe) = std::env::current_exe() else {
        return true;
    };
    path_contains_target_dir(&exe)
}

fn path_contains_target_dir(exe: &Path) -> bool {
    let mut saw_target = false;
    for component in exe.components() {
        let name = component.as_os_str();
        if saw_target && (name == "debug" || name == "release") {
            return true;
        }
        saw_target = name == "target";
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(artifact: &Path) -> EngineConfig {
        EngineConfig::new("https://feed.example.com/", "1.0.0", artifact)
    }

    #[test]
    fn cannot_restart_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = RestartOrchestrator::new(&config_with(&dir.path().join("missing")));
        assert!(!orchestrator.can_restart());
    }

    #[test]
    fn artifact_doubles_as_launcher_when_none_configured() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("tradepost.bin");
        std::fs::write(&artifact, b"binary").unwrap();

        let orchestrator = RestartOrchestrator::new(&config_with(&artifact));
        assert!(orchestrator.can_restart());
        assert_eq!(orchestrator.resolve_launcher().unwrap(), artifact);
    }

    #[test]
    fn missing_launcher_blocks_restart() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("tradepost.bin");
        std::fs::write(&artifact, b"binary").unwrap();

        let config =
            config_with(&artifact).launcher_path(dir.path().join("launcher-not-there"));
        let orchestrator = RestartOrchestrator::new(&config);
        assert!(!orchestrator.can_restart());
    }

    #[tokio::test]
    async fn development_run_is_reported_not_attempted() {
        // Tests execute from the cargo target tree, so the development
        // guard fires before anything is spawned.
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("tradepost.bin");
        std::fs::write(&artifact, b"binary").unwrap();

        let orchestrator =
            RestartOrchestrator::new(&config_with(&artifact)).with_exit_hook(|| {
                panic!("exit hook must not run for a development build");
            });

        let err = orchestrator.restart().await.unwrap_err();
        assert!(matches!(err, UpdateError::RestartUnsupported(_)));
    }

    #[test]
    fn target_tree_detection() {
        assert!(path_contains_target_dir(Path::new(
            "/work/tradepost/target/debug/deps/app-abc123"
        )));
        assert!(path_contains_target_dir(Path::new(
            "/work/tradepost/target/release/app"
        )));
        assert!(!path_contains_target_dir(Path::new("/opt/tradepost/app")));
        assert!(!path_contains_target_dir(Path::new(
            "/home/user/target-practice/debug/app"
        )));
    }
}
