//! yaAGC Peripheral Wire Protocol
//!
//! This crate implements the byte protocol spoken between a DSKY-style
//! peripheral and the yaAGC guidance-computer emulator over a TCP stream.
//!
//! # Frame Format
//!
//! Every message is a 4-byte frame. The top two bits of each byte are a
//! frame-position tag used purely for resynchronization:
//!
//! ```text
//! byte 0: 00t0 cccc   t = 1 for a mask frame, 0 for a data frame
//! byte 1: 01cc cppp   c = channel bits (7 total, split 4+3 across bytes 0-1)
//! byte 2: 10pp pppp   p = payload bits (14 total)
//! byte 3: 11pp pppp
//! ```
//!
//! A [`ChannelUpdate`] encodes as exactly two frames, a mask frame
//! followed by a data frame; the ordering is part of the wire contract.
//! The emulator only ever sends data frames toward the peripheral, plus
//! the reserved all-ones keepalive frame which carries no channel data.
//!
//! # Example
//!
//! ```rust
//! use agc_wire::{AgcCodec, ChannelUpdate};
//!
//! let update = ChannelUpdate::new(0o15, 0o21, 0o37).unwrap();
//! let frames = update.encode();
//!
//! // Decode the data frame back out of the byte stream.
//! let mut codec = AgcCodec::new();
//! codec.push_bytes(&frames[4..]);
//! let word = codec.next_word().unwrap();
//! assert_eq!((word.channel, word.value), (0o15, 0o21));
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod keys;

pub use codec::AgcCodec;
pub use error::WireError;
pub use frame::{ChannelUpdate, ChannelWord, FRAME_LEN, KEEPALIVE};
pub use keys::{KeyOutcome, KeySymbol, Keypad};
