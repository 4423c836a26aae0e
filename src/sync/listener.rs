//! Completion listener
//!
//! Drains the display event stream until the window manager's completion
//! notification for the outstanding request arrives. Unrelated events are
//! expected noise and skipped. A notification on the barrier window with
//! the wrong payload means two barriers crossed, and fails the wait.

use std::time::{Duration, Instant};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::SyncRequest;
use crate::display::{DisplayEvent, DisplaySession};
use crate::error::{Result, SyncError};

/// Default bound on waiting for completion
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How a single event relates to the outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not a completion notification at all
    Noise,
    /// A completion notification for some other window
    ForeignWindow,
    /// The awaited notification
    Resolved,
    /// Addressed to the barrier window but carrying another payload
    Mismatch { got: [u32; 2] },
}

/// Classify one event against the expected request
pub fn classify(event: &DisplayEvent, expected: &SyncRequest) -> Verdict {
    match event {
        DisplayEvent::SyncNotify { window, payload } => {
            if *window != expected.window {
                Verdict::ForeignWindow
            } else if *payload == expected.payload() {
                Verdict::Resolved
            } else {
                Verdict::Mismatch { got: *payload }
            }
        }
        _ => Verdict::Noise,
    }
}

/// A resolved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request: SyncRequest,
    /// Events read and skipped before the match
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Waits for completion notifications, bounded by a timeout and a
/// cancellation token.
#[derive(Debug, Clone)]
pub struct CompletionListener {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CompletionListener {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until `expected` is resolved
    ///
    /// Each accepted request is answered once: calling this again for the
    /// same request without a new send only ends in a timeout.
    pub async fn wait_for<S: DisplaySession>(
        &self,
        session: &mut S,
        expected: &SyncRequest,
    ) -> Result<Completion> {
        let started = Instant::now();
        let drain = tokio::time::timeout(self.timeout, drain_until_resolved(session, expected));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Sync wait on window {} cancelled", expected.window);
                Err(SyncError::Cancelled { window: expected.window })
            }
            result = drain => {
                match result {
                    Ok(Ok(skipped)) => Ok(Completion {
                        request: *expected,
                        skipped,
                        elapsed: started.elapsed(),
                    }),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(SyncError::Timeout {
                        window: expected.window,
                        waited: self.timeout,
                    }),
                }
            }
        }
    }
}

async fn drain_until_resolved<S: DisplaySession>(
    session: &mut S,
    expected: &SyncRequest,
) -> Result<usize> {
    let mut skipped = 0;
    loop {
        let event = session.next_event().await?;
        match classify(&event, expected) {
            Verdict::Resolved => {
                debug!(
                    "Sync {} on window {} completed after {} skipped events",
                    expected.token, expected.window, skipped
                );
                return Ok(skipped);
            }
            Verdict::Mismatch { got } => {
                return Err(SyncError::PayloadMismatch {
                    window: expected.window,
                    got,
                    want: expected.payload(),
                });
            }
            Verdict::ForeignWindow => {
                debug!("Ignoring sync notification for another window: {:?}", event);
                skipped += 1;
            }
            Verdict::Noise => {
                debug!("Ignoring non-sync event {:?}", event);
                skipped += 1;
            }
        }
    }
}
