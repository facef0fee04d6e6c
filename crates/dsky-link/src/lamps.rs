//! Indicator-lamp state and device-command aggregation
//!
//! The panel's discrete indicator lamps (upper-left block of the DSKY
//! face) are driven by an external updater that takes a whole-panel
//! command. Each lamp carries two device encodings: a register/bitmask
//! pair for an SPI LED-driver chip, and a one-character token for the
//! shell-driver command line. The aggregated [`LampCommand`] is a set
//! union of the lit lamps' encodings and is independent of update order.

use crate::cache::{
    ChannelEvent, CHANNEL_DISPLAY, CHANNEL_INDICATORS, CHANNEL_MONITOR,
};

/// Display-channel sub-address that carries lamp bits instead of digits
const LAMP_RELAY: u8 = 12;

/// Capability handle onto the external UI-server process
///
/// Injectable so tests can fake the process check. Polled periodically
/// by the link task; the result drives [`Lamp::UiServer`].
pub trait LivenessProbe: Send {
    /// Whether the UI-server process is currently running
    fn is_alive(&self) -> bool;
}

/// A discrete indicator lamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    UplinkActy,
    Temp,
    NoAtt,
    GimbalLock,
    Standby,
    Prog,
    KeyRel,
    Restart,
    OprErr,
    Tracker,
    PrioDsp,
    Alt,
    NoDap,
    Vel,
    /// Extra lamp showing that the external UI-server process is up;
    /// driven by the liveness probe, never by a channel
    UiServer,
}

impl Lamp {
    /// All lamps, in the panel's canonical order
    pub const ALL: [Lamp; 15] = [
        Lamp::UplinkActy,
        Lamp::Temp,
        Lamp::NoAtt,
        Lamp::GimbalLock,
        Lamp::Standby,
        Lamp::Prog,
        Lamp::KeyRel,
        Lamp::Restart,
        Lamp::OprErr,
        Lamp::Tracker,
        Lamp::PrioDsp,
        Lamp::Alt,
        Lamp::NoDap,
        Lamp::Vel,
        Lamp::UiServer,
    ];

    /// Panel legend for this lamp
    pub fn name(&self) -> &'static str {
        match self {
            Lamp::UplinkActy => "UPLINK ACTY",
            Lamp::Temp => "TEMP",
            Lamp::NoAtt => "NO ATT",
            Lamp::GimbalLock => "GIMBAL LOCK",
            Lamp::Standby => "DSKY STANDBY",
            Lamp::Prog => "PROG",
            Lamp::KeyRel => "KEY REL",
            Lamp::Restart => "RESTART",
            Lamp::OprErr => "OPR ERR",
            Lamp::Tracker => "TRACKER",
            Lamp::PrioDsp => "PRIO DSP",
            Lamp::Alt => "ALT",
            Lamp::NoDap => "NO DAP",
            Lamp::Vel => "VEL",
            Lamp::UiServer => "UI SERVER",
        }
    }

    /// Shell-driver command-line token for this lamp
    pub fn cli_token(&self) -> char {
        match self {
            Lamp::UplinkActy => '3',
            Lamp::Temp => '2',
            Lamp::NoAtt => '5',
            Lamp::GimbalLock => '4',
            Lamp::Standby => '7',
            Lamp::Prog => '6',
            Lamp::KeyRel => 'B',
            Lamp::Restart => '8',
            Lamp::OprErr => '9',
            Lamp::Tracker => 'A',
            Lamp::PrioDsp => 'D',
            Lamp::Alt => 'C',
            Lamp::NoDap => 'F',
            Lamp::Vel => 'E',
            Lamp::UiServer => 'G',
        }
    }

    /// LED-driver chip encoding: (digit register 1..=8, bitmask)
    pub fn spi_encoding(&self) -> (usize, u8) {
        match self {
            Lamp::UplinkActy => (1, 0x70),
            Lamp::Temp => (1, 0x07),
            Lamp::NoAtt => (2, 0x70),
            Lamp::GimbalLock => (2, 0x07),
            Lamp::Standby => (3, 0x70),
            Lamp::Prog => (3, 0x07),
            Lamp::KeyRel => (4, 0x70),
            Lamp::Restart => (4, 0x07),
            Lamp::OprErr => (5, 0x70),
            Lamp::Tracker => (5, 0x07),
            Lamp::PrioDsp => (6, 0x70),
            Lamp::Alt => (6, 0x07),
            Lamp::NoDap => (7, 0x70),
            Lamp::Vel => (7, 0x07),
            Lamp::UiServer => (1, 0x80),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Aggregated whole-panel device command
///
/// Deterministic function of the set of lit lamps: the 8-register LED
/// image plus the shell-driver token string, built in canonical lamp
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LampCommand {
    /// Union of SPI register masks, indexed by register number (0 unused)
    pub registers: [u8; 9],
    /// Shell-driver tokens for the lit lamps
    pub cli: String,
}

/// Lit/unlit state for every indicator lamp
#[derive(Debug, Default)]
pub struct LampPanel {
    lit: [bool; Lamp::ALL.len()],
}

impl LampPanel {
    /// Create a panel with every lamp dark
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a lamp is currently lit
    pub fn is_lit(&self, lamp: Lamp) -> bool {
        self.lit[lamp.index()]
    }

    /// Set one lamp; returns true if its state changed
    pub fn set(&mut self, lamp: Lamp, lit: bool) -> bool {
        let slot = &mut self.lit[lamp.index()];
        let changed = *slot != lit;
        *slot = lit;
        changed
    }

    /// Apply a forwarded channel change to the lamp states
    ///
    /// Returns true if any lamp changed. Channel bits that drive the
    /// seven-segment display, COMP ACTY, or the verb/noun flash are not
    /// lamps and are left to the rendering consumer.
    pub fn apply(&mut self, event: &ChannelEvent) -> bool {
        let v = event.value;
        match (event.channel, event.relay) {
            (CHANNEL_INDICATORS, None) => {
                let mut changed = self.set(Lamp::UplinkActy, v & 0x04 != 0);
                changed |= self.set(Lamp::Temp, v & 0x08 != 0);
                changed
            }
            (CHANNEL_DISPLAY, Some(LAMP_RELAY)) => {
                let mut changed = self.set(Lamp::Vel, v & 0x04 != 0);
                changed |= self.set(Lamp::NoAtt, v & 0x08 != 0);
                changed |= self.set(Lamp::Alt, v & 0x10 != 0);
                changed |= self.set(Lamp::GimbalLock, v & 0x20 != 0);
                changed |= self.set(Lamp::Tracker, v & 0x80 != 0);
                changed |= self.set(Lamp::Prog, v & 0x100 != 0);
                changed
            }
            (CHANNEL_MONITOR, None) => {
                let mut changed = self.set(Lamp::KeyRel, v & 0o20 != 0);
                changed |= self.set(Lamp::OprErr, v & 0o100 != 0);
                changed |= self.set(Lamp::Restart, v & 0o200 != 0);
                changed |= self.set(Lamp::Standby, v & 0o400 != 0);
                changed
            }
            _ => false,
        }
    }

    /// Aggregate the lit lamps into one device command
    pub fn command(&self) -> LampCommand {
        let mut command = LampCommand::default();
        for lamp in Lamp::ALL {
            if self.is_lit(lamp) {
                let (register, mask) = lamp.spi_encoding();
                command.registers[register] |= mask;
                command.cli.push(lamp.cli_token());
            }
        }
        command
    }
}
