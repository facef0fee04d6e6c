//! Channel-state cache
//!
//! The emulator rewrites its output channels far more often than their
//! interesting bits actually change. The cache masks each inbound word
//! down to the bits the panel cares about, keys it by channel (and
//! sub-address, for the multiplexed display channel), and forwards only
//! genuine changes downstream.

use std::collections::HashMap;

use agc_wire::ChannelWord;

/// Display-register channel, multiplexed over a sub-address in the high
/// value bits
pub const CHANNEL_DISPLAY: u8 = 0o10;
/// COMP ACTY / UPLINK ACTY / TEMP / V-N flash channel
pub const CHANNEL_INDICATORS: u8 = 0o11;
/// DSKY test-lights channel
pub const CHANNEL_TEST: u8 = 0o13;
/// Standby / KEY REL / OPR ERR / RESTART channel
pub const CHANNEL_MONITOR: u8 = 0o163;

/// Relevant bits per channel (everything else never triggers a change)
const INDICATORS_MASK: u16 = 0x2E;
const TEST_MASK: u16 = 0x200;
const MONITOR_MASK: u16 = 0o720;
const DISPLAY_VALUE_MASK: u16 = 0o3777;

/// A genuine channel change forwarded to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Channel number
    pub channel: u8,
    /// Sub-address for the multiplexed display channel
    pub relay: Option<u8>,
    /// Masked value; only the channel's relevant bits are present
    pub value: u16,
}

/// Result of offering one decoded word to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The masked value differs from the last one seen; forward it
    Changed(ChannelEvent),
    /// Nothing relevant changed; suppress
    Unchanged,
    /// Out-of-range sub-address; a defined no-op, not an error
    Ignored,
}

/// Last observed masked value per channel group
///
/// Starts empty, so the first word for any group always emits.
#[derive(Debug, Default)]
pub struct ChannelStateCache {
    last: HashMap<(u8, Option<u8>), u16>,
}

impl ChannelStateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a decoded word; emits an event only if the masked value
    /// changed for its channel group.
    pub fn update(&mut self, word: ChannelWord) -> CacheOutcome {
        let (relay, masked) = match word.channel {
            CHANNEL_DISPLAY => {
                let relay = ((word.value >> 11) & 0o17) as u8;
                if !(1..=12).contains(&relay) {
                    return CacheOutcome::Ignored;
                }
                (Some(relay), word.value & DISPLAY_VALUE_MASK)
            }
            CHANNEL_INDICATORS => (None, word.value & INDICATORS_MASK),
            CHANNEL_TEST => (None, word.value & TEST_MASK),
            CHANNEL_MONITOR => (None, word.value & MONITOR_MASK),
            _ => (None, word.value),
        };

        let key = (word.channel, relay);
        if self.last.get(&key) == Some(&masked) {
            return CacheOutcome::Unchanged;
        }
        self.last.insert(key, masked);

        CacheOutcome::Changed(ChannelEvent {
            channel: word.channel,
            relay,
            value: masked,
        })
    }
}
