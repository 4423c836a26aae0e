//! Error taxonomy for the synchronization barrier
//!
//! Every variant ends the current scenario. Nothing here is retried: a
//! barrier is a correctness check, so a failure is reported as-is.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

use crate::display::WindowId;

/// Result alias used by the barrier core.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures surfaced by the display session.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The display server refused the connection.
    #[error("failed to connect to display: {0}")]
    Connect(#[from] ConnectError),
    /// The established connection broke.
    #[error("display connection failed: {0}")]
    Connection(#[from] ConnectionError),
    /// A request was answered with an error.
    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),
    /// The server reported an error on the event stream.
    #[error("display protocol error: {0}")]
    Protocol(String),
    /// Waiting on the connection socket failed.
    #[error("display socket I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The event stream ended.
    #[error("display event stream closed")]
    Closed,
}

impl From<ReplyOrIdError> for DisplayError {
    fn from(value: ReplyOrIdError) -> Self {
        match value {
            ReplyOrIdError::ConnectionError(e) => Self::Connection(e),
            ReplyOrIdError::X11Error(e) => Self::Protocol(format!("{:?}", e)),
            ReplyOrIdError::IdsExhausted => Self::Protocol("X11 resource ids exhausted".into()),
        }
    }
}

/// Errors surfaced by a barrier round trip.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The control channel could not be reached or broke mid-exchange.
    #[error("control channel {} unreachable: {source}", path.display())]
    Transport {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// No control socket could be located.
    #[error("no window manager control socket found (tried config, $I3SOCK, $SWAYSOCK, I3_SOCKET_PATH)")]
    SocketNotFound,
    /// The acknowledgement could not be decoded.
    #[error("malformed acknowledgement: {0}")]
    MalformedReply(String),
    /// The window manager refused the request.
    #[error("window manager rejected sync for window {window}: {}", diagnostic.as_deref().unwrap_or("no diagnostic"))]
    Rejected {
        window: WindowId,
        diagnostic: Option<String>,
    },
    /// A notification addressed to the barrier window carried the wrong payload.
    #[error("sync payload mismatch on window {window}: got [{:#x}, {:#x}], want [{:#x}, {:#x}]", got[0], got[1], want[0], want[1])]
    PayloadMismatch {
        window: WindowId,
        got: [u32; 2],
        want: [u32; 2],
    },
    /// The request was accepted but its completion never arrived.
    #[error("sync on window {window} accepted but not completed within {waited:?}")]
    Timeout { window: WindowId, waited: Duration },
    /// The scenario was torn down while waiting.
    #[error("sync on window {window} cancelled")]
    Cancelled { window: WindowId },
    /// The display session failed.
    #[error(transparent)]
    Display(#[from] DisplayError),
}

impl SyncError {
    pub(crate) fn transport(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Transport {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the environment rather than of the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. } | SyncError::SocketNotFound | SyncError::Display(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_includes_diagnostic() {
        let err = SyncError::Rejected {
            window: WindowId(0x1234),
            diagnostic: Some("window not found".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x1234"));
        assert!(msg.contains("window not found"));
    }

    #[test]
    fn test_mismatch_message_is_hex() {
        let err = SyncError::PayloadMismatch {
            window: WindowId(0x1234),
            got: [0x1234, 0x1],
            want: [0x1234, 0xdeadbeef],
        };
        assert!(err.to_string().contains("0xdeadbeef"));
        assert!(!err.is_transport());
    }
}
