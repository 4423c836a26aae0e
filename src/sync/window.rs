//! Barrier window: the addressable endpoint of the completion notification

use log::debug;
use x11rb::protocol::xproto::EventMask;

use crate::display::{DisplaySession, WindowId, WindowSpec};
use crate::error::Result;

/// Mask registered on every barrier window
///
/// Client messages sent with an empty mask reach the window's creator
/// regardless; structure notifications are kept so setup races show up in
/// the debug log.
pub fn barrier_event_mask() -> EventMask {
    EventMask::STRUCTURE_NOTIFY | EventMask::KEY_PRESS | EventMask::KEY_RELEASE
}

/// A 1x1 window owned by the test, used only as a notification target
#[derive(Debug, PartialEq, Eq)]
pub struct BarrierWindow {
    id: WindowId,
    event_mask: EventMask,
}

impl BarrierWindow {
    /// Create the window. Returns once the server knows about it.
    pub fn create<S: DisplaySession>(session: &mut S) -> Result<Self> {
        let spec = WindowSpec {
            width: 1,
            height: 1,
            event_mask: barrier_event_mask(),
        };
        let id = session.create_window(&spec)?;
        debug!("Barrier window {} ready", id);

        Ok(Self {
            id,
            event_mask: spec.event_mask,
        })
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn event_mask(&self) -> EventMask {
        self.event_mask
    }

    pub fn destroy<S: DisplaySession>(self, session: &mut S) -> Result<()> {
        session.destroy_window(self.id)?;
        Ok(())
    }
}
