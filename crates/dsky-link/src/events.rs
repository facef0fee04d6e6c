//! Unified event stream for the link engine
//!
//! Everything an external rendering collaborator needs arrives through
//! one broadcast channel: forwarded channel changes, verb/noun flash
//! toggles, and link lifecycle.

use crate::cache::ChannelEvent;

/// Events emitted by the link task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connected to the emulator
    Connected,

    /// The emulator closed the connection
    Disconnected,

    /// A genuine channel change (already deduplicated and masked)
    Channel(ChannelEvent),

    /// COMP ACTY indicator state
    CompActy(bool),

    /// The decoder hit a corrupt frame and resynchronized
    FramingError {
        /// Corrupt frames seen since the link started
        total: u64,
    },

    /// Verb/noun flash phase: true = digits visible
    ///
    /// Emitted every half-period while the computer requests flashing,
    /// with a final `true` when flashing stops so the digits are left
    /// visible.
    VerbNounFlash(bool),

    /// The playback log has been fully replayed
    PlaybackFinished,

    /// The operator keyed the shutdown chord (five RSET presses)
    ShutdownRequested,
}

impl LinkEvent {
    /// The channel change carried by this event, if any
    pub fn channel_event(&self) -> Option<&ChannelEvent> {
        match self {
            LinkEvent::Channel(event) => Some(event),
            _ => None,
        }
    }
}
