//! Display session seam
//!
//! The barrier only needs three things from the display server: create an
//! addressable window, read the window manager's socket hint, and block on
//! the next event. [`DisplaySession`] names exactly that surface so the
//! barrier can run against a real X server ([`X11Session`]) or the
//! in-process fake in [`crate::testing`].

use std::fmt;
use std::path::PathBuf;

use x11rb::protocol::xproto::EventMask;

use crate::error::DisplayError;

pub mod x11;

pub use x11::X11Session;

/// X11 window identifier (XID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u32> for WindowId {
    fn from(value: u32) -> Self {
        WindowId(value)
    }
}

/// Geometry and event interest of a window to create
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub width: u16,
    pub height: u16,
    pub event_mask: EventMask,
}

/// Structure-change notifications the barrier sees as noise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Create,
    Configure,
    Map,
    Unmap,
    Reparent,
    Destroy,
}

/// An event read from the display session, reduced to what the barrier
/// distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// `I3_SYNC` client message, format 32. `payload` is `data32[0..2]`.
    SyncNotify { window: WindowId, payload: [u32; 2] },
    /// Any other client message.
    ClientMessage { window: WindowId, message_type: u32 },
    /// Structure notification on some window.
    Structure { window: WindowId, kind: StructureKind },
    /// Everything else, by X11 response type.
    Other { response_type: u8 },
}

impl DisplayEvent {
    /// Window the event is addressed to, if it has one.
    pub fn window(&self) -> Option<WindowId> {
        match self {
            DisplayEvent::SyncNotify { window, .. }
            | DisplayEvent::ClientMessage { window, .. }
            | DisplayEvent::Structure { window, .. } => Some(*window),
            DisplayEvent::Other { .. } => None,
        }
    }
}

/// A connection to the display server, owned by a single scenario.
///
/// Implementations must not share their event stream with anything else:
/// the barrier assumes every event it reads was produced after the
/// session was opened.
#[allow(async_fn_in_trait)]
pub trait DisplaySession {
    /// Create a top-level window and wait until the server has it.
    fn create_window(&mut self, spec: &WindowSpec) -> Result<WindowId, DisplayError>;

    /// Destroy a window created by this session.
    fn destroy_window(&mut self, window: WindowId) -> Result<(), DisplayError>;

    /// The control socket path the window manager advertises on the root
    /// window, if any.
    fn wm_socket_hint(&mut self) -> Result<Option<PathBuf>, DisplayError>;

    /// Block until the next event arrives.
    async fn next_event(&mut self) -> Result<DisplayEvent, DisplayError>;
}
