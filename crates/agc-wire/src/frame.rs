//! Frame layout and channel-update encoding
//!
//! A channel update always travels as two consecutive 4-byte frames: a
//! mask frame announcing which bit positions of the value are valid,
//! then a data frame carrying the value itself.

use crate::error::WireError;

/// Length of one wire frame in bytes
pub const FRAME_LEN: usize = 4;

/// Reserved all-ones keepalive frame (liveness ping, no channel data)
pub const KEEPALIVE: [u8; FRAME_LEN] = [0xFF; FRAME_LEN];

/// Highest valid channel number (7 bits: 4 in byte 0, 3 in byte 1)
pub const CHANNEL_MAX: u8 = 0o177;

/// Highest valid payload value (14 bits)
pub const PAYLOAD_MAX: u16 = 0o37777;

/// Mask-frame marker bit in byte 0
const MASK_FRAME_BIT: u8 = 0x20;

/// A write to one of the emulated computer's i/o channels
///
/// Only bit positions set in `mask` are semantically meaningful in
/// `value`. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelUpdate {
    channel: u8,
    value: u16,
    mask: u16,
}

impl ChannelUpdate {
    /// Create a new channel update, validating field ranges
    pub fn new(channel: u8, value: u16, mask: u16) -> Result<Self, WireError> {
        if channel > CHANNEL_MAX {
            return Err(WireError::ChannelOutOfRange(channel));
        }
        if value > PAYLOAD_MAX {
            return Err(WireError::ValueOutOfRange(value));
        }
        if mask > PAYLOAD_MAX {
            return Err(WireError::MaskOutOfRange(mask));
        }
        Ok(Self {
            channel,
            value,
            mask,
        })
    }

    /// Construct from fields already known to be in range
    pub(crate) const fn new_unchecked(channel: u8, value: u16, mask: u16) -> Self {
        Self {
            channel,
            value,
            mask,
        }
    }

    /// The channel number (0..=0o177)
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The 14-bit value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// The 14-bit validity mask
    pub fn mask(&self) -> u16 {
        self.mask
    }

    /// Encode as a mask frame followed by a data frame
    pub fn encode(&self) -> [u8; 2 * FRAME_LEN] {
        let mut out = [0u8; 2 * FRAME_LEN];
        encode_frame(&mut out[..FRAME_LEN], true, self.channel, self.mask);
        encode_frame(&mut out[FRAME_LEN..], false, self.channel, self.value);
        out
    }
}

/// Pack one 4-byte frame: position tags in the top two bits of each
/// byte, channel split 4+3 across bytes 0-1, payload split 3+6+6.
fn encode_frame(buf: &mut [u8], is_mask: bool, channel: u8, payload: u16) {
    let marker = if is_mask { MASK_FRAME_BIT } else { 0x00 };
    buf[0] = marker | ((channel >> 3) & 0x0F);
    buf[1] = 0x40 | ((channel << 3) & 0x38) | ((payload >> 12) & 0x07) as u8;
    buf[2] = 0x80 | ((payload >> 6) & 0x3F) as u8;
    buf[3] = 0xC0 | (payload & 0x3F) as u8;
}

/// One decoded inbound (channel, value) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWord {
    /// Channel number (0..=0o177)
    pub channel: u8,
    /// 14-bit value
    pub value: u16,
}

impl ChannelWord {
    /// Encode as a bare data frame (how the emulator reports channel
    /// writes). Out-of-range bits are masked off.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        encode_frame(
            &mut out,
            false,
            self.channel & CHANNEL_MAX,
            self.value & PAYLOAD_MAX,
        );
        out
    }
}
