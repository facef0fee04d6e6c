//! Streaming frame decoder
//!
//! Bytes arrive in arbitrarily sized chunks over a non-blocking
//! transport; the codec accumulates them until a full frame is
//! available. Absence of a complete frame is simply "no word yet" and
//! the caller polls again later.
//!
//! The stream is long-lived and occasional corrupted or short ping
//! frames are expected, so framing faults never tear down the
//! connection: the decoder scans forward for the next plausible frame
//! start (a byte with a zero top nibble) and carries on.

use tracing::warn;

use crate::frame::{ChannelWord, FRAME_LEN, KEEPALIVE};

/// Streaming decoder for the yaAGC peripheral protocol
///
/// Only data frames are decoded; the emulator never sends mask frames
/// toward the peripheral.
#[derive(Debug, Default)]
pub struct AgcCodec {
    buffer: Vec<u8>,
    keepalives: u64,
    corrupt_frames: u64,
}

impl AgcCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4 * FRAME_LEN),
            keepalives: 0,
            corrupt_frames: 0,
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next decoded channel word
    ///
    /// Returns `None` when no complete valid frame is buffered. Never
    /// blocks; keepalives and corrupted frames are consumed internally.
    pub fn next_word(&mut self) -> Option<ChannelWord> {
        while self.buffer.len() >= FRAME_LEN {
            let frame = [self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]];

            if frame_tags_valid(&frame) {
                self.buffer.drain(..FRAME_LEN);
                return Some(decode_frame(&frame));
            }

            if frame == KEEPALIVE {
                // Liveness ping, not a protocol violation.
                self.keepalives += 1;
                self.buffer.drain(..FRAME_LEN);
                continue;
            }

            // Older emulator versions ping with a single 0xFF byte, so a
            // frame led by 0xFF isn't reported as corruption; anything
            // else is.
            if frame[0] != 0xFF {
                self.corrupt_frames += 1;
                warn!(
                    "illegal packet: {:02X} {:02X} {:02X} {:02X}, resynchronizing",
                    frame[0], frame[1], frame[2], frame[3]
                );
            }
            self.resync();
        }
        None
    }

    /// Drop bytes up to the next plausible frame start within the
    /// current window.
    fn resync(&mut self) {
        let skip = (1..FRAME_LEN)
            .find(|&i| self.buffer[i] & 0xF0 == 0x00)
            .unwrap_or(FRAME_LEN);
        self.buffer.drain(..skip);
    }

    /// Number of keepalive frames consumed so far
    pub fn keepalives(&self) -> u64 {
        self.keepalives
    }

    /// Number of corrupted frames reported so far
    pub fn corrupt_frames(&self) -> u64 {
        self.corrupt_frames
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Check the frame-position tags of all four bytes against the expected
/// data-frame pattern.
fn frame_tags_valid(frame: &[u8; FRAME_LEN]) -> bool {
    frame[0] & 0xF0 == 0x00
        && frame[1] & 0xC0 == 0x40
        && frame[2] & 0xC0 == 0x80
        && frame[3] & 0xC0 == 0xC0
}

/// Inverse bit extraction of the channel and value fields
fn decode_frame(frame: &[u8; FRAME_LEN]) -> ChannelWord {
    let channel = ((frame[0] & 0x0F) << 3) | ((frame[1] & 0x38) >> 3);
    let value = (u16::from(frame[1] & 0x07) << 12)
        | (u16::from(frame[2] & 0x3F) << 6)
        | u16::from(frame[3] & 0x3F);
    ChannelWord { channel, value }
}
