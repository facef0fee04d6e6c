//! Channel-event recording and playback
//!
//! A recording is a newline-delimited text log, one line per genuine
//! channel change: the elapsed milliseconds since the first recorded
//! event, then the channel and the raw decoded value as octal tokens.
//! The raw value is what gets logged (not the masked value forwarded
//! downstream) so a replay carries the display channel's sub-address
//! bits and re-derives events exactly as a live run would.
//!
//! Recording is strictly best-effort: a failed write must never
//! interrupt live operation. Playback is the opposite: with no live
//! source of truth to fall back to, a log that cannot be loaded is
//! fatal to the caller.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use agc_wire::ChannelWord;
use tracing::{debug, info};

use crate::error::LinkError;

/// Best-effort appender for the channel-event log
pub struct Recorder {
    file: File,
    origin: Option<Instant>,
}

impl Recorder {
    /// Create the log file, truncating any previous recording
    pub fn create(path: &Path) -> Result<Self, LinkError> {
        let file = File::create(path)?;
        info!(path = %path.display(), "recording channel traffic");
        Ok(Self { file, origin: None })
    }

    /// Append one event; write failures are swallowed
    pub fn record(&mut self, channel: u8, value: u16) {
        let origin = *self.origin.get_or_insert_with(Instant::now);
        let offset_ms = origin.elapsed().as_millis();
        if let Err(e) = writeln!(self.file, "{} {:o} {:o}", offset_ms, channel, value) {
            debug!("record write failed (ignored): {}", e);
        }
    }
}

/// One parsed line of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackEvent {
    /// Milliseconds since the first recorded event
    pub offset_ms: u64,
    /// Channel number
    pub channel: u8,
    /// Channel value
    pub value: u16,
}

/// Replays a recorded log with faithful relative timing
///
/// The whole log is loaded up front. During replay a virtual clock
/// starts at the first poll; each event becomes due when the *previous
/// event's virtual timestamp* plus the recorded gap has elapsed, so the
/// recorded event-to-event spacing survives tick-loop jitter.
#[derive(Debug)]
pub struct Playback {
    events: Vec<PlaybackEvent>,
    index: usize,
    baseline: Option<Instant>,
    last_offset_ms: u64,
}

impl Playback {
    /// Load a recording from disk
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LinkError::PlaybackLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let mut events = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(parse_line(line).ok_or_else(|| LinkError::PlaybackParse {
                path: PathBuf::from(path),
                line: i + 1,
            })?);
        }

        info!(path = %path.display(), events = events.len(), "loaded playback log");
        Ok(Self::from_events(events))
    }

    /// Build a playback directly from events (used by tests)
    pub fn from_events(events: Vec<PlaybackEvent>) -> Self {
        Self {
            events,
            index: 0,
            baseline: None,
            last_offset_ms: 0,
        }
    }

    /// Emit the next due event, if any
    ///
    /// At most one event per call, so downstream processing stays
    /// interleaved with the caller's other per-tick work.
    pub fn poll(&mut self, now: Instant) -> Option<ChannelWord> {
        let event = *self.events.get(self.index)?;
        let baseline = *self.baseline.get_or_insert(now);

        let gap_ms = event.offset_ms.saturating_sub(self.last_offset_ms);
        let due = baseline + std::time::Duration::from_millis(gap_ms);
        if now < due {
            return None;
        }

        // Advance the virtual clock to the due time, not to `now`.
        self.baseline = Some(due);
        self.last_offset_ms = event.offset_ms;
        self.index += 1;
        Some(ChannelWord {
            channel: event.channel,
            value: event.value,
        })
    }

    /// Whether every event has been emitted
    pub fn is_finished(&self) -> bool {
        self.index >= self.events.len()
    }
}

/// Parse `<offset-ms> <channel-octal> <value-octal>`; offsets may be
/// floats (older recorders emitted them), rounded to whole ms.
fn parse_line(line: &str) -> Option<PlaybackEvent> {
    let mut tokens = line.split_whitespace();
    let offset: f64 = tokens.next()?.parse().ok()?;
    let channel = u8::from_str_radix(tokens.next()?, 8).ok()?;
    let value = u16::from_str_radix(tokens.next()?, 8).ok()?;
    if tokens.next().is_some() || !offset.is_finite() || offset < 0.0 {
        return None;
    }
    Some(PlaybackEvent {
        offset_ms: offset.round() as u64,
        channel,
        value,
    })
}
