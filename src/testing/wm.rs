//! Scriptable stand-in for an i3-compatible window manager
//!
//! Listens on a real Unix socket and speaks i3-ipc framing, so the
//! [`IpcClient`](crate::ipc::IpcClient) under test goes through its
//! actual transport. Completion notifications are routed through a
//! [`FakeDisplay`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use super::FakeDisplay;
use crate::display::{DisplayEvent, WindowId};
use crate::ipc::codec;
use crate::ipc::{SyncPayload, SyncResponse};

/// How the fake answers sync requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmBehavior {
    /// Accept known windows and notify; reject unknown ones
    Honest,
    /// Accept, then never notify (as if the WM died)
    Silent,
    /// Refuse with the given diagnostic
    Reject(String),
    /// Reply with an undecodable payload
    Garbage,
    /// Accept, then notify with a wrong token
    CorruptToken,
    /// Accept and notify twice
    DoubleNotify,
    /// Read the request and never answer
    NoReply,
    /// Close the connection instead of answering
    Hangup,
}

struct Shared {
    behavior: WmBehavior,
    requests: Vec<SyncPayload>,
}

pub struct FakeWm {
    socket_path: PathBuf,
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl FakeWm {
    /// Bind the control socket at `socket_path` and start serving
    pub async fn start(
        socket_path: impl Into<PathBuf>,
        display: FakeDisplay,
        behavior: WmBehavior,
    ) -> io::Result<Self> {
        let socket_path = socket_path.into();
        let listener = UnixListener::bind(&socket_path)?;
        info!("Fake window manager listening on {:?}", socket_path);

        let shared = Arc::new(Mutex::new(Shared {
            behavior,
            requests: Vec::new(),
        }));
        let task = tokio::spawn(accept_connections(listener, display, shared.clone()));

        Ok(Self {
            socket_path,
            shared,
            task,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn set_behavior(&self, behavior: WmBehavior) {
        self.shared.lock().behavior = behavior;
    }

    /// Every sync request received so far
    pub fn requests(&self) -> Vec<SyncPayload> {
        self.shared.lock().requests.clone()
    }
}

impl Drop for FakeWm {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_connections(
    listener: UnixListener,
    display: FakeDisplay,
    shared: Arc<Mutex<Shared>>,
) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(handle_client(stream, display.clone(), shared.clone()));
    }
}

async fn handle_client(mut stream: UnixStream, display: FakeDisplay, shared: Arc<Mutex<Shared>>) {
    loop {
        let frame = match codec::read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Fake WM client gone: {}", e);
                return;
            }
        };

        if frame.message_type != codec::SYNC {
            let reply = SyncResponse::rejected("unsupported message type");
            if reply_json(&mut stream, &reply).await.is_err() {
                return;
            }
            continue;
        }

        let payload: SyncPayload = match serde_json::from_slice(&frame.payload) {
            Ok(payload) => payload,
            Err(e) => {
                let reply = SyncResponse::rejected(format!("invalid payload: {}", e));
                if reply_json(&mut stream, &reply).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let behavior = {
            let mut shared = shared.lock();
            shared.requests.push(payload);
            shared.behavior.clone()
        };
        let window = payload.window();

        let result = match behavior {
            WmBehavior::Honest
            | WmBehavior::DoubleNotify
            | WmBehavior::CorruptToken
            | WmBehavior::Silent
                if !display.knows_window(window) =>
            {
                reply_json(&mut stream, &SyncResponse::rejected("window not found")).await
            }
            WmBehavior::Honest => {
                let result = reply_json(&mut stream, &SyncResponse::accepted()).await;
                notify(&display, window, payload.rnd);
                result
            }
            WmBehavior::DoubleNotify => {
                let result = reply_json(&mut stream, &SyncResponse::accepted()).await;
                notify(&display, window, payload.rnd);
                notify(&display, window, payload.rnd);
                result
            }
            WmBehavior::CorruptToken => {
                let result = reply_json(&mut stream, &SyncResponse::accepted()).await;
                notify(&display, window, payload.rnd ^ 0x1);
                result
            }
            WmBehavior::Silent => reply_json(&mut stream, &SyncResponse::accepted()).await,
            WmBehavior::Reject(diagnostic) => {
                reply_json(&mut stream, &SyncResponse::rejected(diagnostic)).await
            }
            WmBehavior::Garbage => {
                codec::write_frame(&mut stream, codec::SYNC, b"definitely not json").await
            }
            WmBehavior::NoReply => continue,
            WmBehavior::Hangup => return,
        };

        if result.is_err() {
            return;
        }
    }
}

fn notify(display: &FakeDisplay, window: WindowId, rnd: u32) {
    let event = DisplayEvent::SyncNotify {
        window,
        payload: [window.0, rnd],
    };
    if !display.send_to_owner(window, event) {
        debug!("Fake WM notification for {} had no recipient", window);
    }
}

async fn reply_json(stream: &mut UnixStream, reply: &SyncResponse) -> io::Result<()> {
    let payload = serde_json::to_vec(reply).map_err(io::Error::other)?;
    codec::write_frame(stream, codec::SYNC, &payload).await
}
