//! Testing infrastructure for the barrier
//!
//! Lets the full barrier round trip run without an X server or a window
//! manager binary:
//!
//! 1. **FakeDisplay / FakeSession**: an in-memory display server with
//!    per-connection event streams and window ownership.
//!
//! 2. **FakeWm**: a control socket speaking i3-ipc framing whose answers
//!    are scripted by [`WmBehavior`], delivering completion notifications
//!    through the fake display.
//!
//! # Example
//!
//! ```ignore
//! let dir = tempfile::tempdir()?;
//! let display = FakeDisplay::new();
//! let wm = FakeWm::start(dir.path().join("ipc.sock"), display.clone(), WmBehavior::Honest).await?;
//!
//! let client = IpcClient::connect(wm.socket_path()).await?;
//! let options = SyncOptions::default();
//! let mut barrier = Barrier::new(display.connect(), client, options, CancellationToken::new())?;
//! barrier.sync().await?;
//! ```

mod display;
mod wm;

pub use display::{FakeDisplay, FakeSession};
pub use wm::{FakeWm, WmBehavior};
