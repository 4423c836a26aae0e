//! X11 display session on top of x11rb
//!
//! x11rb's [`RustConnection`] is synchronous. Events are read without
//! blocking the runtime: queued events are drained with `poll_for_event`
//! and the socket is awaited through tokio's [`AsyncFd`] when the queue is
//! empty.

use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

use log::{debug, info};
use tokio::io::unix::AsyncFd;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt as _, CreateWindowAux, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::{DisplayEvent, DisplaySession, StructureKind, WindowId, WindowSpec};
use crate::error::DisplayError;

/// Type atom of the window manager's completion notification
pub const SYNC_ATOM_NAME: &[u8] = b"I3_SYNC";

/// Root window property holding the control socket path
pub const SOCKET_PATH_ATOM_NAME: &[u8] = b"I3_SOCKET_PATH";

/// Upper bound, in 32-bit units, on the socket path property read
const SOCKET_PATH_MAX_LONGS: u32 = 1024;

struct ConnectionFd(RustConnection);

impl AsRawFd for ConnectionFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.stream().as_raw_fd()
    }
}

/// A scenario-scoped X11 connection
///
/// Must be created inside a tokio runtime, since the socket is registered
/// with the reactor on connect.
pub struct X11Session {
    conn: AsyncFd<ConnectionFd>,
    screen: usize,
    sync_atom: Atom,
    socket_path_atom: Atom,
    display_name: Option<String>,
}

impl X11Session {
    /// Open a fresh connection. `None` uses `$DISPLAY`.
    pub fn connect(display_name: Option<&str>) -> Result<Self, DisplayError> {
        let (conn, screen) = RustConnection::connect(display_name)?;

        let sync_atom = conn.intern_atom(false, SYNC_ATOM_NAME)?.reply()?.atom;
        let socket_path_atom = conn.intern_atom(false, SOCKET_PATH_ATOM_NAME)?.reply()?.atom;

        let conn = AsyncFd::new(ConnectionFd(conn))?;
        info!(
            "🔌 Connected to X display {} (screen {})",
            display_name.unwrap_or("$DISPLAY"),
            screen
        );

        Ok(Self {
            conn,
            screen,
            sync_atom,
            socket_path_atom,
            display_name: display_name.map(str::to_owned),
        })
    }

    fn conn(&self) -> &RustConnection {
        &self.conn.get_ref().0
    }

    fn root(&self) -> Window {
        self.conn().setup().roots[self.screen].root
    }

    /// Display this session was opened on, if given explicitly
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Reduce an x11rb event to what the barrier distinguishes
///
/// Only format-32 client messages typed `sync_atom` are completions.
fn reduce(event: Event, sync_atom: Atom) -> Result<DisplayEvent, DisplayError> {
    let reduced = match event {
        Event::ClientMessage(msg) => {
            let window = WindowId(msg.window);
            if msg.type_ == sync_atom && msg.format == 32 {
                let data = msg.data.as_data32();
                DisplayEvent::SyncNotify {
                    window,
                    payload: [data[0], data[1]],
                }
            } else {
                DisplayEvent::ClientMessage {
                    window,
                    message_type: msg.type_,
                }
            }
        }
        Event::CreateNotify(ev) => structure(ev.window, StructureKind::Create),
        Event::ConfigureNotify(ev) => structure(ev.window, StructureKind::Configure),
        Event::MapNotify(ev) => structure(ev.window, StructureKind::Map),
        Event::UnmapNotify(ev) => structure(ev.window, StructureKind::Unmap),
        Event::ReparentNotify(ev) => structure(ev.window, StructureKind::Reparent),
        Event::DestroyNotify(ev) => structure(ev.window, StructureKind::Destroy),
        Event::Error(err) => return Err(DisplayError::Protocol(format!("{:?}", err))),
        other => DisplayEvent::Other {
            response_type: other.raw_response_type(),
        },
    };
    Ok(reduced)
}

/// Decode an `I3_SOCKET_PATH` value, which may carry a trailing NUL
fn decode_socket_path(value: &[u8]) -> Option<PathBuf> {
    let end = value.iter().position(|b| *b == 0).unwrap_or(value.len());
    if end == 0 {
        return None;
    }
    Some(PathBuf::from(String::from_utf8_lossy(&value[..end]).into_owned()))
}

fn structure(window: Window, kind: StructureKind) -> DisplayEvent {
    DisplayEvent::Structure {
        window: WindowId(window),
        kind,
    }
}

impl DisplaySession for X11Session {
    fn create_window(&mut self, spec: &WindowSpec) -> Result<WindowId, DisplayError> {
        let conn = self.conn();
        let screen = &conn.setup().roots[self.screen];
        let wid = conn.generate_id()?;

        let aux = CreateWindowAux::new()
            .background_pixel(0xffff_ffff)
            .event_mask(spec.event_mask);
        conn.create_window(
            screen.root_depth,
            wid,
            screen.root,
            0,
            0,
            spec.width,
            spec.height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &aux,
        )?
        .check()?;

        debug!("Created window {:#x} ({}x{})", wid, spec.width, spec.height);
        Ok(WindowId(wid))
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<(), DisplayError> {
        self.conn().destroy_window(window.0)?.check()?;
        debug!("Destroyed window {}", window);
        Ok(())
    }

    fn wm_socket_hint(&mut self) -> Result<Option<PathBuf>, DisplayError> {
        let reply = self
            .conn()
            .get_property(
                false,
                self.root(),
                self.socket_path_atom,
                AtomEnum::ANY,
                0,
                SOCKET_PATH_MAX_LONGS,
            )?
            .reply()?;

        Ok(decode_socket_path(&reply.value))
    }

    async fn next_event(&mut self) -> Result<DisplayEvent, DisplayError> {
        loop {
            // first drain any events already queued
            if let Some(event) = self.conn().poll_for_event()? {
                return reduce(event, self.sync_atom);
            }

            // wait until the X socket becomes readable
            let mut guard = self.conn.readable().await?;
            guard.clear_ready();
        }
    }
}
