//! Link configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default yaAGC port
pub const DEFAULT_PORT: u16 = 19798;

/// Link engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Emulator host
    pub host: String,
    /// Emulator port
    pub port: u16,
    /// Polling-loop tick interval in milliseconds
    pub pulse_ms: u64,
    /// Deadtime between lamp-flush attempts in milliseconds
    pub lamp_deadtime_ms: u64,
    /// Connection attempts before giving up
    pub connect_attempts: u32,
    /// Record incoming channel traffic to this log
    pub record_path: Option<PathBuf>,
    /// Replay channel traffic from this log instead of connecting
    pub playback_path: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            pulse_ms: 50,
            lamp_deadtime_ms: 100,
            connect_attempts: 30,
            record_path: None,
            playback_path: None,
        }
    }
}

impl LinkConfig {
    /// Responsiveness preset for really slow host systems
    pub fn slow() -> Self {
        Self {
            pulse_ms: 250,
            lamp_deadtime_ms: 250,
            ..Self::default()
        }
    }

    /// Tick interval of the polling loop
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    /// Deadtime between lamp-flush attempts
    pub fn lamp_deadtime(&self) -> Duration {
        Duration::from_millis(self.lamp_deadtime_ms)
    }
}
