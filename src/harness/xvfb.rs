//! Virtual X display supervision
//! Starts an Xvfb server on a free display number for one harness run

use crate::config::DisplayConfig;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::{
    process::{Child as TokioChild, Command as TokioCommand},
    time::sleep,
};

/// Directory holding X server sockets
const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// First display number tried; low numbers are left to real sessions
const FIRST_DISPLAY: u32 = 10;
const LAST_DISPLAY: u32 = 200;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running Xvfb server, killed on drop
pub struct VirtualDisplay {
    process: Option<TokioChild>,
    display_number: u32,
}

impl VirtualDisplay {
    /// Start Xvfb and wait until it accepts connections on its socket
    pub async fn start(config: &DisplayConfig) -> Result<Self> {
        let display_number = find_available_display()?;
        let display_name = format!(":{}", display_number);

        info!("🚀 Starting Xvfb on display {}", display_name);

        let mut cmd = TokioCommand::new(&config.xvfb_path);
        cmd.arg(&display_name)
            .arg("-nolisten")
            .arg("tcp")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Add additional arguments from config
        for arg in &config.extra_args {
            cmd.arg(arg);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", config.xvfb_path))?;

        let mut display = Self {
            process: Some(child),
            display_number,
        };
        display.wait_for_server_ready(config.startup_timeout()).await?;

        info!("✅ Xvfb ready on display {}", display_name);
        Ok(display)
    }

    /// Wait for the server socket, failing early if Xvfb exits
    async fn wait_for_server_ready(&mut self, timeout: Duration) -> Result<()> {
        let socket_path = socket_path(self.display_number);
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;

        loop {
            if socket_path.exists() {
                debug!("✅ Xvfb socket ready after {} attempts", attempts + 1);
                return Ok(());
            }

            if let Some(process) = self.process.as_mut() {
                if let Some(status) = process.try_wait().context("Failed to poll Xvfb process")? {
                    anyhow::bail!("Xvfb exited during startup with status {}", status);
                }
            }

            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Xvfb did not create {} within {:?}",
                    socket_path.display(),
                    timeout
                );
            }

            attempts += 1;
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Value for `DISPLAY`
    pub fn display_name(&self) -> String {
        format!(":{}", self.display_number)
    }

    /// Get display number
    pub fn display_number(&self) -> u32 {
        self.display_number
    }

    /// Whether the server process is still alive
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill the server and reap it
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            info!("🛑 Stopping Xvfb on display {}", self.display_name());

            if let Err(e) = process.kill().await {
                warn!("⚠️ Error killing Xvfb process: {}", e);
            }
        }

        Ok(())
    }
}

fn socket_path(display_number: u32) -> PathBuf {
    Path::new(X11_SOCKET_DIR).join(format!("X{}", display_number))
}

fn lock_path(display_number: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/.X{}-lock", display_number))
}

/// Find an X11 display number with neither a lock file nor a socket
fn find_available_display() -> Result<u32> {
    for display_num in FIRST_DISPLAY..LAST_DISPLAY {
        if !lock_path(display_num).exists() && !socket_path(display_num).exists() {
            debug!("🔍 Found available display: :{}", display_num);
            return Ok(display_num);
        }
    }

    Err(anyhow::anyhow!("No available X11 display numbers found"))
}
