//! # wmsync
//!
//! Deterministic synchronization between a test process and an
//! i3-compatible X11 window manager.
//!
//! The window manager applies commands on its own event loop, so a test
//! cannot tell when a command has taken effect. A barrier closes that gap:
//! the test sends a tagged `SYNC` request over the control channel, the
//! window manager answers it after draining its queue by sending an
//! `I3_SYNC` client message to a window the test owns, and the test waits
//! for that exact message.
//!
//! ## Architecture
//!
//! - `sync`: barrier round trip (token, barrier window, completion listener)
//! - `ipc`: i3-ipc framing and the sync request/acknowledgement
//! - `display`: display session seam and the x11rb implementation
//! - `harness`: Xvfb and window manager supervision, per-scenario connections
//! - `config`: TOML harness configuration
//! - `testing`: in-process fake display and window manager
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wmsync::{config::HarnessConfig, harness::Harness};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::load("testdata/wmsync.toml")?;
//!     let harness = Harness::start(&config).await?;
//!
//!     let mut barrier = harness.scenario().await?.barrier()?;
//!     // ... issue commands to the window manager ...
//!     barrier.sync().await?;
//!     // ... inspect window state ...
//!
//!     harness.shutdown().await
//! }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod harness;
pub mod ipc;
pub mod sync;
pub mod testing;

// Re-export main types for easy access
pub use config::HarnessConfig;
pub use display::{DisplayEvent, DisplaySession, WindowId, X11Session};
pub use error::{DisplayError, SyncError};
pub use harness::{Harness, Scenario};
pub use ipc::{IpcClient, SyncResponse};
pub use sync::{Barrier, Completion, SyncOptions, SyncRequest, SyncToken};

/// Version information for wmsync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
