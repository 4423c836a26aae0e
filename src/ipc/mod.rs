//! Control channel client for i3-compatible window managers
//!
//! This module speaks exactly one exchange of the i3 IPC protocol: the
//! `SYNC` request and its acknowledgement. An acknowledgement only says
//! the window manager queued the barrier; completion arrives later as an
//! X11 client message (see [`crate::sync::listener`]).

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;

use crate::display::{DisplaySession, WindowId};
use crate::error::{Result, SyncError};
use crate::sync::SyncRequest;

pub mod codec;

use codec::FrameError;

/// Environment variables that may name the control socket, in lookup order
pub const SOCKET_ENV_VARS: [&str; 2] = ["I3SOCK", "SWAYSOCK"];

/// Default bound on waiting for an acknowledgement
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Wire form of a sync request
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPayload {
    pub rnd: u32,
    pub window: u32,
}

impl From<&SyncRequest> for SyncPayload {
    fn from(request: &SyncRequest) -> Self {
        SyncPayload {
            rnd: request.token.value(),
            window: request.window.0,
        }
    }
}

/// The window manager's acknowledgement of a sync request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResponse {
    pub fn accepted() -> Self {
        SyncResponse {
            success: true,
            error: None,
        }
    }

    pub fn rejected(diagnostic: impl Into<String>) -> Self {
        SyncResponse {
            success: false,
            error: Some(diagnostic.into()),
        }
    }

    /// Turn a refusal into [`SyncError::Rejected`]
    pub fn accept(self, request: &SyncRequest) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(SyncError::Rejected {
                window: request.window,
                diagnostic: self.error,
            })
        }
    }
}

/// Connection to the window manager's control socket
///
/// Acknowledgements carry no correlation field, so the stream is given up
/// once an exchange is left half-read. Later calls fail with
/// [`SyncError::Transport`] instead of reading a stale reply.
pub struct IpcClient {
    stream: Option<UnixStream>,
    socket_path: PathBuf,
    reply_timeout: Duration,
}

impl IpcClient {
    /// Connect to the control socket at `path`
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| SyncError::transport(&socket_path, e))?;

        info!("🔗 Connected to window manager IPC: {:?}", socket_path);

        Ok(Self {
            stream: Some(stream),
            socket_path,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    /// Bound the wait for each acknowledgement
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one sync request and read its acknowledgement
    ///
    /// Does not wait for the completion notification.
    pub async fn sync(&mut self, request: &SyncRequest) -> Result<SyncResponse> {
        let payload = serde_json::to_vec(&SyncPayload::from(request))
            .expect("sync payload of two integers always serializes");

        // Taken for the exchange and only put back once it completed
        let Some(mut stream) = self.stream.take() else {
            return Err(SyncError::transport(
                &self.socket_path,
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    "connection abandoned after an incomplete exchange",
                ),
            ));
        };

        codec::write_frame(&mut stream, codec::SYNC, &payload)
            .await
            .map_err(|e| SyncError::transport(&self.socket_path, e))?;
        debug!("📤 Sent sync request: {}", String::from_utf8_lossy(&payload));

        let reply = read_reply(&mut stream, &self.socket_path);
        let frame = match tokio::time::timeout(self.reply_timeout, reply).await {
            Ok(frame) => frame?,
            Err(_) => {
                return Err(SyncError::transport(
                    &self.socket_path,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no acknowledgement within {:?}", self.reply_timeout),
                    ),
                ))
            }
        };
        self.stream = Some(stream);

        if frame.message_type != codec::SYNC {
            return Err(SyncError::MalformedReply(format!(
                "expected reply type {}, got {}",
                codec::SYNC,
                frame.message_type
            )));
        }

        let response: SyncResponse = serde_json::from_slice(&frame.payload).map_err(|e| {
            SyncError::MalformedReply(format!(
                "{}: {}",
                e,
                String::from_utf8_lossy(&frame.payload)
            ))
        })?;
        debug!("📨 Sync acknowledgement: {:?}", response);

        Ok(response)
    }

    /// Whether the connection is still usable
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

async fn read_reply(stream: &mut UnixStream, socket_path: &Path) -> Result<codec::Frame> {
    loop {
        let frame = codec::read_frame(stream).await.map_err(|e| match e {
            FrameError::Io(e) => SyncError::transport(socket_path, e),
            other => SyncError::MalformedReply(other.to_string()),
        })?;

        if frame.is_event() {
            debug!("Skipping unsolicited IPC event type {:#x}", frame.message_type);
            continue;
        }
        return Ok(frame);
    }
}

/// Locate the control socket
///
/// Lookup order: `explicit`, `$I3SOCK`, `$SWAYSOCK`, then the
/// `I3_SOCKET_PATH` property on the session's root window.
pub fn resolve_socket_path<S: DisplaySession>(
    explicit: Option<&Path>,
    session: &mut S,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    for var in SOCKET_ENV_VARS {
        if let Some(value) = std::env::var_os(var) {
            if !value.is_empty() {
                debug!("Control socket from ${}", var);
                return Ok(PathBuf::from(value));
            }
        }
    }

    match session.wm_socket_hint()? {
        Some(path) => {
            debug!("Control socket from root window property: {:?}", path);
            Ok(path)
        }
        None => Err(SyncError::SocketNotFound),
    }
}

impl SyncPayload {
    pub fn window(&self) -> WindowId {
        WindowId(self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncToken;

    fn request() -> SyncRequest {
        SyncRequest::new(WindowId(0x1234), SyncToken::new(0xdeadbeef))
    }

    #[test]
    fn test_payload_field_names() {
        let json = serde_json::to_string(&SyncPayload::from(&request())).unwrap();
        assert_eq!(json, format!(r#"{{"rnd":{},"window":{}}}"#, 0xdeadbeefu32, 0x1234));
    }

    #[test]
    fn test_response_without_error_field() {
        let response: SyncResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(response, SyncResponse::accepted());
        assert!(response.accept(&request()).is_ok());
    }

    #[test]
    fn test_rejection_carries_diagnostic() {
        let response: SyncResponse =
            serde_json::from_str(r#"{"success":false,"error":"unknown window"}"#).unwrap();
        match response.accept(&request()) {
            Err(SyncError::Rejected { window, diagnostic }) => {
                assert_eq!(window, WindowId(0x1234));
                assert_eq!(diagnostic.as_deref(), Some("unknown window"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
