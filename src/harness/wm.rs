//! Window manager subprocess
//!
//! The WM runs with a cleared environment: only `DISPLAY`, `PATH` and the
//! configured extras reach it. A watcher task owns the child; when the WM
//! exits on its own the harness cancellation token fires, so scenarios
//! blocked on a completion notification end instead of hanging.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WmConfig;

pub struct WmProcess {
    command: String,
    pid: Option<u32>,
    stop: CancellationToken,
    watcher: Option<JoinHandle<Option<ExitStatus>>>,
}

/// Arguments and environment the WM is started with
pub(crate) fn build_command(config: &WmConfig, display_name: &str) -> Result<Command> {
    let mut cmd = Command::new(&config.command);
    cmd.env_clear()
        .env("DISPLAY", display_name)
        .env("PATH", std::env::var_os("PATH").unwrap_or_default());
    for (key, value) in &config.extra_env {
        cmd.env(key, value);
    }

    if let Some(file) = &config.config_file {
        cmd.arg("-c").arg(absolute(file)?);
    }
    cmd.args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    Ok(cmd)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}

impl WmProcess {
    /// Start the WM against `display_name`. `exited` is cancelled if the WM
    /// terminates before [`WmProcess::stop`].
    pub fn spawn(config: &WmConfig, display_name: &str, exited: CancellationToken) -> Result<Self> {
        let mut child = build_command(config, display_name)?
            .spawn()
            .with_context(|| format!("Failed to spawn window manager {}", config.command))?;
        let pid = child.id();

        info!("🪟 Started window manager {} (pid {:?}) on {}", config.command, pid, display_name);

        let stop = CancellationToken::new();
        let stop_signal = stop.clone();
        let command = config.command.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match &status {
                        Ok(status) => warn!("⚠️ Window manager {} exited: {}", command, status),
                        Err(e) => warn!("⚠️ Error waiting for {}: {}", command, e),
                    }
                    exited.cancel();
                    status.ok()
                }
                _ = stop_signal.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!("⚠️ Error killing window manager {}: {}", command, e);
                    }
                    None
                }
            }
        });

        Ok(Self {
            command: config.command.clone(),
            pid,
            stop,
            watcher: Some(watcher),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has not exited yet
    pub fn is_running(&self) -> bool {
        self.watcher
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    /// Kill the WM if still running. Returns its exit status if it had
    /// already exited by itself.
    pub async fn stop(&mut self) -> Result<Option<ExitStatus>> {
        self.stop.cancel();
        let Some(watcher) = self.watcher.take() else {
            return Ok(None);
        };
        let status = watcher
            .await
            .context("Window manager watcher task failed")?;
        info!("🛑 Window manager {} stopped", self.command);
        Ok(status)
    }
}

impl Drop for WmProcess {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
