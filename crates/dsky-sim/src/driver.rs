//! Scriptable fakes for the link's injected capabilities
//!
//! The lamp driver records every issued command and answers busy-ness
//! from a canned script, so scheduler behavior is fully deterministic
//! under test. The liveness probe is a settable flag standing in for
//! the UI-server process check.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dsky_link::{LampCommand, LampDriver, LivenessProbe};

#[derive(Default)]
struct Inner {
    busy: Mutex<VecDeque<bool>>,
    issued: Mutex<Vec<LampCommand>>,
}

/// A [`LampDriver`] fake with scripted busy responses
///
/// Cheaply cloneable; clones share the script and the issue log, so a
/// test can hold one handle while a task owns another.
#[derive(Clone, Default)]
pub struct FakeLampDriver {
    inner: Arc<Inner>,
}

impl FakeLampDriver {
    /// A driver that always reports idle
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose first `is_busy` calls answer from `script`, then
    /// report idle forever
    pub fn with_busy_script(script: &[bool]) -> Self {
        Self {
            inner: Arc::new(Inner {
                busy: Mutex::new(script.iter().copied().collect()),
                issued: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Every command issued so far, in order
    pub fn issued(&self) -> Vec<LampCommand> {
        self.inner.issued.lock().unwrap().clone()
    }

    /// The most recently issued command
    pub fn last_issued(&self) -> Option<LampCommand> {
        self.inner.issued.lock().unwrap().last().cloned()
    }
}

impl LampDriver for FakeLampDriver {
    fn is_busy(&self) -> bool {
        self.inner.busy.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn issue(&self, command: &LampCommand) {
        self.inner.issued.lock().unwrap().push(command.clone());
    }
}

/// A [`LivenessProbe`] fake backed by a settable flag
///
/// Clones share the flag, so a test can flip it while the link task
/// holds its own handle.
#[derive(Clone, Default)]
pub struct FakeLivenessProbe {
    alive: Arc<AtomicBool>,
}

impl FakeLivenessProbe {
    /// A probe with the given initial answer
    pub fn new(alive: bool) -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(alive)),
        }
    }

    /// Change what the probe reports from now on
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

impl LivenessProbe for FakeLivenessProbe {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
