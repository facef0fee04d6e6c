//! Error types for wire protocol encoding

use thiserror::Error;

/// Errors that can occur while constructing or encoding channel updates
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Channel number does not fit in 7 bits
    #[error("channel out of range: 0o{0:o} (max 0o177)")]
    ChannelOutOfRange(u8),

    /// Value does not fit in 14 bits
    #[error("value out of range: 0o{0:o} (max 0o37777)")]
    ValueOutOfRange(u16),

    /// Mask does not fit in 14 bits
    #[error("mask out of range: 0o{0:o} (max 0o37777)")]
    MaskOutOfRange(u16),
}
