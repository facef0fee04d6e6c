//! Debounced lamp-flush scheduling
//!
//! The external lamp updater is slow and stateful: it must never run
//! twice concurrently, and rapid lamp toggles should collapse into one
//! issuance. The scheduler only observes the updater's liveness
//! (busy/idle); the issue itself is fire-and-forget.
//!
//! The flush logic is an explicit state machine driven by a single
//! timer: a command is issued only after the updater has been observed
//! idle on two consecutive deadtime-spaced checks, which debounces
//! bursts of lamp changes into a single run.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::lamps::LampCommand;

/// Consecutive idle observations required before issuing
const IDLE_CHECKS_REQUIRED: u8 = 2;

/// Capability handle onto the external lamp updater
///
/// Injectable so tests can fake the updater without spawning real
/// processes. `issue` carries no return status; only liveness is
/// observable.
pub trait LampDriver: Send + Sync {
    /// Whether the updater is currently running
    fn is_busy(&self) -> bool;

    /// Start the updater with the given whole-panel command
    fn issue(&self, command: &LampCommand);
}

/// Where the scheduler is in its flush cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    /// Nothing pending
    Idle,
    /// A flush is wanted; counting consecutive idle observations
    AwaitingIdle {
        /// Idle checks seen so far
        checks: u8,
    },
}

/// Debouncing, overlap-avoiding scheduler for lamp flushes
pub struct LampScheduler<D> {
    driver: D,
    deadtime: Duration,
    state: FlushState,
    last_issued: Option<LampCommand>,
}

impl<D: LampDriver> LampScheduler<D> {
    /// Create a scheduler around a driver
    pub fn new(driver: D, deadtime: Duration) -> Self {
        Self {
            driver,
            deadtime,
            state: FlushState::Idle,
            last_issued: None,
        }
    }

    /// Run one flush check against the current target command
    ///
    /// Returns the delay after which the caller should poll again, or
    /// `None` when the cycle is complete (either the command was just
    /// issued or nothing needed doing).
    pub fn poll(&mut self, target: &LampCommand) -> Option<Duration> {
        if self.last_issued.as_ref() == Some(target) {
            self.state = FlushState::Idle;
            return None;
        }

        if self.driver.is_busy() {
            debug!("delaying lamp flush to avoid overlap");
            self.state = FlushState::AwaitingIdle { checks: 0 };
            return Some(self.deadtime);
        }

        let checks = match self.state {
            FlushState::Idle => 1,
            FlushState::AwaitingIdle { checks } => checks + 1,
        };
        if checks < IDLE_CHECKS_REQUIRED {
            self.state = FlushState::AwaitingIdle { checks };
            return Some(self.deadtime);
        }

        debug!(cli = %target.cli, "issuing lamp command");
        self.driver.issue(target);
        self.last_issued = Some(target.clone());
        self.state = FlushState::Idle;
        None
    }

    /// The last command successfully handed to the driver
    pub fn last_issued(&self) -> Option<&LampCommand> {
        self.last_issued.as_ref()
    }

    /// Consume the scheduler, returning the driver
    pub fn into_driver(self) -> D {
        self.driver
    }
}

/// Drive a [`LampScheduler`] from a watch channel of target commands
///
/// The task wakes on every target change and on its own deadtime timer,
/// and keeps flushing after the sender closes until the final target has
/// been issued, so an intended end state is never silently dropped.
pub async fn run_lamp_task<D: LampDriver>(
    mut scheduler: LampScheduler<D>,
    mut target_rx: watch::Receiver<LampCommand>,
) -> LampScheduler<D> {
    let mut closed = false;
    loop {
        let target = target_rx.borrow_and_update().clone();
        match scheduler.poll(&target) {
            None => {
                if closed || target_rx.changed().await.is_err() {
                    break;
                }
            }
            Some(delay) => {
                if closed {
                    sleep(delay).await;
                } else {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        changed = target_rx.changed() => {
                            if changed.is_err() {
                                closed = true;
                            }
                        }
                    }
                }
            }
        }
    }
    info!("lamp scheduler task ended");
    scheduler
}
