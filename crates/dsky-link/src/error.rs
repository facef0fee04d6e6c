//! Error types for the link engine

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the link engine
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire protocol error
    #[error("wire error: {0}")]
    Wire(#[from] agc_wire::WireError),

    /// Playback log could not be opened or read
    ///
    /// Fatal to playback mode: there is no live source to fall back to.
    #[error("cannot load playback log {path}: {source}")]
    PlaybackLoad {
        /// The log file path
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Playback log line did not parse
    #[error("malformed playback log {path} at line {line}")]
    PlaybackParse {
        /// The log file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
    },

    /// Could not reach the emulator within the retry budget
    #[error("could not connect to yaAGC at {host}:{port} after {attempts} attempts")]
    ConnectFailed {
        /// Emulator host
        host: String,
        /// Emulator port
        port: u16,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Operation aborted by a shutdown signal
    #[error("cancelled by shutdown signal")]
    Cancelled,
}
