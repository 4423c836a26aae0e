//! In-memory display server
//!
//! [`FakeDisplay`] plays the X server: it allocates window ids, remembers
//! which session created each window, and routes events. Each
//! [`FakeSession`] only sees events delivered after it connected.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::display::{DisplayEvent, DisplaySession, WindowId, WindowSpec};
use crate::error::DisplayError;

/// Base of the fake XID range, mirroring a typical X server client base
const DEFAULT_FIRST_WINDOW: u32 = 0x0040_0001;

struct DisplayState {
    next_window: u32,
    next_session: usize,
    windows: HashMap<WindowId, (usize, WindowSpec)>,
    sessions: HashMap<usize, mpsc::UnboundedSender<DisplayEvent>>,
    socket_hint: Option<PathBuf>,
}

/// Shared handle to the fake display server
#[derive(Clone)]
pub struct FakeDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl Default for FakeDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self::with_first_window_id(DEFAULT_FIRST_WINDOW)
    }

    /// Allocate window ids starting at `first`
    pub fn with_first_window_id(first: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(DisplayState {
                next_window: first,
                next_session: 0,
                windows: HashMap::new(),
                sessions: HashMap::new(),
                socket_hint: None,
            })),
        }
    }

    /// Open a new connection
    pub fn connect(&self) -> FakeSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(id, tx);

        FakeSession {
            id,
            display: self.clone(),
            events: rx,
        }
    }

    /// Advertise a control socket on the root window
    pub fn set_socket_hint(&self, path: Option<PathBuf>) {
        self.state.lock().socket_hint = path;
    }

    pub fn knows_window(&self, window: WindowId) -> bool {
        self.state.lock().windows.contains_key(&window)
    }

    pub fn window_spec(&self, window: WindowId) -> Option<WindowSpec> {
        self.state.lock().windows.get(&window).map(|(_, spec)| *spec)
    }

    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Deliver an event to the creator of `window`, as X11 does for client
    /// messages sent with an empty mask. Returns false if nobody owns it.
    pub fn send_to_owner(&self, window: WindowId, event: DisplayEvent) -> bool {
        let state = self.state.lock();
        let Some((owner, _)) = state.windows.get(&window) else {
            return false;
        };
        state
            .sessions
            .get(owner)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Deliver an event to every connected session
    pub fn broadcast(&self, event: DisplayEvent) {
        let state = self.state.lock();
        for tx in state.sessions.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Drop every connection, as if the server died
    pub fn disconnect_all(&self) {
        self.state.lock().sessions.clear();
    }
}

/// One connection to a [`FakeDisplay`]
pub struct FakeSession {
    id: usize,
    display: FakeDisplay,
    events: mpsc::UnboundedReceiver<DisplayEvent>,
}

impl FakeSession {
    pub fn display(&self) -> &FakeDisplay {
        &self.display
    }

    /// Queue an event on this connection only
    pub fn inject(&self, event: DisplayEvent) {
        if let Some(tx) = self.display.state.lock().sessions.get(&self.id) {
            let _ = tx.send(event);
        }
    }

    /// Events delivered but not yet read
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl DisplaySession for FakeSession {
    fn create_window(&mut self, spec: &WindowSpec) -> Result<WindowId, DisplayError> {
        let mut state = self.display.state.lock();
        if !state.sessions.contains_key(&self.id) {
            return Err(DisplayError::Closed);
        }
        let id = WindowId(state.next_window);
        state.next_window += 1;
        state.windows.insert(id, (self.id, *spec));
        Ok(id)
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<(), DisplayError> {
        let mut state = self.display.state.lock();
        match state.windows.get(&window) {
            Some((owner, _)) if *owner == self.id => {
                state.windows.remove(&window);
                Ok(())
            }
            _ => Err(DisplayError::Protocol(format!("BadWindow {}", window))),
        }
    }

    fn wm_socket_hint(&mut self) -> Result<Option<PathBuf>, DisplayError> {
        Ok(self.display.state.lock().socket_hint.clone())
    }

    async fn next_event(&mut self) -> Result<DisplayEvent, DisplayError> {
        self.events.recv().await.ok_or(DisplayError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::window::barrier_event_mask;

    fn spec() -> WindowSpec {
        WindowSpec {
            width: 1,
            height: 1,
            event_mask: barrier_event_mask(),
        }
    }

    #[tokio::test]
    async fn test_events_route_to_creator_only() {
        let display = FakeDisplay::with_first_window_id(0x1234);
        let mut a = display.connect();
        let b = display.connect();

        let window = a.create_window(&spec()).unwrap();
        assert_eq!(window, WindowId(0x1234));

        let ev = DisplayEvent::SyncNotify {
            window,
            payload: [0x1234, 1],
        };
        assert!(display.send_to_owner(window, ev.clone()));
        assert_eq!(a.next_event().await.unwrap(), ev);
        assert_eq!(b.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_new_session_sees_no_earlier_events() {
        let display = FakeDisplay::new();
        let early = display.connect();
        display.broadcast(DisplayEvent::Other { response_type: 33 });

        let late = display.connect();
        assert_eq!(early.pending_events(), 1);
        assert_eq!(late.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_closes_stream() {
        let display = FakeDisplay::new();
        let mut session = display.connect();
        display.disconnect_all();
        assert!(matches!(
            session.next_event().await,
            Err(DisplayError::Closed)
        ));
    }

    #[test]
    fn test_destroy_foreign_window_fails() {
        let display = FakeDisplay::new();
        let mut a = display.connect();
        let mut b = display.connect();
        let window = a.create_window(&spec()).unwrap();
        assert!(b.destroy_window(window).is_err());
        assert!(a.destroy_window(window).is_ok());
        assert!(!display.knows_window(window));
    }
}
