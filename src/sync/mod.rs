//! Synchronization barrier
//!
//! A barrier round trip:
//!
//! 1. a 1x1 [`BarrierWindow`] is created (before anything is sent, so the
//!    notification cannot arrive unobserved),
//! 2. a fresh [`SyncToken`] is sent with the window id over the control
//!    channel and the acknowledgement checked,
//! 3. the [`CompletionListener`] waits for the `I3_SYNC` client message
//!    carrying `[window, token]`.
//!
//! When [`Barrier::sync`] returns `Ok`, every command the window manager
//! received before the request has been applied. That ordering is the
//! window manager's guarantee; the barrier only observes it.

use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::display::{DisplaySession, WindowId};
use crate::error::Result;
use crate::ipc::{IpcClient, DEFAULT_REPLY_TIMEOUT};

pub mod listener;
pub mod token;
pub mod window;

pub use listener::{classify, Completion, CompletionListener, Verdict, DEFAULT_TIMEOUT};
pub use token::{SyncToken, TokenSource};
pub use window::BarrierWindow;

/// One barrier request. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncRequest {
    pub window: WindowId,
    pub token: SyncToken,
}

impl SyncRequest {
    pub fn new(window: WindowId, token: SyncToken) -> Self {
        Self { window, token }
    }

    /// The `[window, token]` pair the completion notification must carry
    pub fn payload(&self) -> [u32; 2] {
        [self.window.0, self.token.value()]
    }
}

/// A request the window manager accepted and has not yet completed
///
/// Consumed by [`Barrier::wait`], so an acceptance is awaited once.
#[derive(Debug)]
#[must_use = "an accepted sync must be waited for"]
pub struct PendingSync {
    request: SyncRequest,
}

impl PendingSync {
    pub fn request(&self) -> &SyncRequest {
        &self.request
    }
}

/// Tunables for a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Bound on waiting for the completion notification
    pub timeout: Duration,
    /// Bound on waiting for the acknowledgement
    pub reply_timeout: Duration,
    /// Seed for reproducible tokens
    pub token_seed: Option<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            token_seed: None,
        }
    }
}

/// Barrier between a test and the window manager
///
/// Owns its display session and control connection. Every operation takes
/// `&mut self`, so at most one request is outstanding on the window.
pub struct Barrier<S: DisplaySession> {
    session: S,
    client: IpcClient,
    window: BarrierWindow,
    tokens: TokenSource,
    listener: CompletionListener,
}

impl<S: DisplaySession> Barrier<S> {
    /// Create the barrier window and take ownership of the connections
    pub fn new(
        mut session: S,
        client: IpcClient,
        options: SyncOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let window = BarrierWindow::create(&mut session)?;
        let tokens = match options.token_seed {
            Some(seed) => TokenSource::seeded(seed),
            None => TokenSource::new(),
        };

        Ok(Self {
            session,
            client: client.with_reply_timeout(options.reply_timeout),
            window,
            tokens,
            listener: CompletionListener::new(options.timeout, cancel),
        })
    }

    /// Window the completion notifications are addressed to
    pub fn window(&self) -> WindowId {
        self.window.id()
    }

    /// The display session, for issuing the commands under test
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Send a fresh request and check it was accepted
    pub async fn send(&mut self) -> Result<PendingSync> {
        let request = SyncRequest::new(self.window.id(), self.tokens.next_token());
        debug!("Sending sync {} for window {}", request.token, request.window);

        self.client.sync(&request).await?.accept(&request)?;
        Ok(PendingSync { request })
    }

    /// Wait for an accepted request to complete
    pub async fn wait(&mut self, pending: PendingSync) -> Result<Completion> {
        self.listener.wait_for(&mut self.session, &pending.request).await
    }

    /// Full round trip: send, then wait for completion
    pub async fn sync(&mut self) -> Result<Completion> {
        let pending = self.send().await?;
        let completion = self.wait(pending).await?;
        info!(
            "✅ Window manager synced (window {}, token {}, {:?})",
            completion.request.window, completion.request.token, completion.elapsed
        );
        Ok(completion)
    }

    /// Destroy the barrier window and hand the session back
    pub fn close(mut self) -> Result<S> {
        self.window.destroy(&mut self.session)?;
        Ok(self.session)
    }
}
