//! Test harness orchestration
//!
//! Starts a virtual display, runs the window manager against it, and hands
//! out per-scenario connections. Each [`Scenario`] opens its own display
//! connection after setup is finished, so its event stream holds nothing
//! from the harness's own probing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::HarnessConfig;
use crate::display::{DisplaySession, X11Session};
use crate::ipc::IpcClient;
use crate::sync::{Barrier, SyncOptions};

pub mod wm;
pub mod xvfb;

pub use wm::WmProcess;
pub use xvfb::VirtualDisplay;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A virtual display with a window manager running on it
pub struct Harness {
    display: VirtualDisplay,
    wm: WmProcess,
    cancel: CancellationToken,
    socket_path: PathBuf,
    options: SyncOptions,
}

impl Harness {
    /// Start Xvfb, then the WM, then wait for its control socket
    pub async fn start(config: &HarnessConfig) -> Result<Self> {
        config.validate()?;

        let mut display = VirtualDisplay::start(&config.display).await?;
        let display_name = display.display_name();

        let cancel = CancellationToken::new();
        let mut wm = match WmProcess::spawn(&config.wm, &display_name, cancel.clone()) {
            Ok(wm) => wm,
            Err(e) => {
                display.stop().await.ok();
                return Err(e);
            }
        };

        let socket_path = match wait_for_wm(config, &display_name, &cancel).await {
            Ok(path) => path,
            Err(e) => {
                wm.stop().await.ok();
                display.stop().await.ok();
                return Err(e);
            }
        };

        info!("✨ Harness ready: display {}, control socket {:?}", display_name, socket_path);

        Ok(Self {
            display,
            wm,
            cancel,
            socket_path,
            options: config.sync.options(),
        })
    }

    /// Value of `DISPLAY` for the virtual display
    pub fn display_name(&self) -> String {
        self.display.display_name()
    }

    /// The WM's control socket
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Fires when the WM exits or the harness shuts down
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn wm(&self) -> &WmProcess {
        &self.wm
    }

    /// Open fresh connections for one scenario
    pub async fn scenario(&self) -> Result<Scenario> {
        if self.cancel.is_cancelled() {
            anyhow::bail!("Window manager is no longer running");
        }

        let display_name = self.display_name();
        let session = X11Session::connect(Some(&display_name))
            .with_context(|| format!("Failed to open scenario connection to {}", display_name))?;
        let client = IpcClient::connect(&self.socket_path).await?;

        Ok(Scenario {
            session,
            client,
            cancel: self.cancel.child_token(),
            options: self.options,
        })
    }

    /// Stop the WM, then the display
    pub async fn shutdown(mut self) -> Result<()> {
        info!("🔽 Shutting down harness on {}", self.display_name());
        self.cancel.cancel();

        if let Some(status) = self.wm.stop().await? {
            warn!("⚠️ Window manager had already exited: {}", status);
        }
        self.display.stop().await?;

        Ok(())
    }
}

/// Poll until the WM's control socket accepts connections
async fn wait_for_wm(
    config: &HarnessConfig,
    display_name: &str,
    exited: &CancellationToken,
) -> Result<PathBuf> {
    let timeout = config.wm.startup_timeout();
    let deadline = Instant::now() + timeout;
    let mut probe: Option<X11Session> = None;

    loop {
        if exited.is_cancelled() {
            anyhow::bail!("Window manager exited during startup");
        }

        if probe.is_none() {
            match X11Session::connect(Some(display_name)) {
                Ok(session) => probe = Some(session),
                Err(e) => debug!("Probe connection to {} not ready: {}", display_name, e),
            }
        }

        // The process environment is not consulted: it may point at the
        // user's own window manager.
        let candidate = match (&config.wm.socket_path, probe.as_mut()) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(session)) => session
                .wm_socket_hint()
                .context("Failed to read control socket property")?,
            (None, None) => None,
        };

        if let Some(path) = candidate {
            match tokio::net::UnixStream::connect(&path).await {
                Ok(_) => return Ok(path),
                Err(e) => debug!("Control socket {:?} not ready: {}", path, e),
            }
        }

        if Instant::now() >= deadline {
            anyhow::bail!(
                "Window manager {} did not open its control socket within {:?}",
                config.wm.command,
                timeout
            );
        }
        sleep(READY_POLL_INTERVAL).await;
    }
}

/// Connections scoped to a single test scenario
pub struct Scenario {
    session: X11Session,
    client: IpcClient,
    cancel: CancellationToken,
    options: SyncOptions,
}

impl Scenario {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn session_mut(&mut self) -> &mut X11Session {
        &mut self.session
    }

    /// Create the barrier window and return the barrier
    pub fn barrier(self) -> Result<Barrier<X11Session>> {
        let barrier = Barrier::new(self.session, self.client, self.options, self.cancel)?;
        Ok(barrier)
    }
}
