//! DSKY Link Simulation Library
//!
//! This crate provides a simulation layer for testing the DSKY link
//! engine without a running yaAGC emulator or physical lamp hardware.
//! It includes:
//!
//! - **ScriptedAgc**: a TCP endpoint that plays a scripted sequence of
//!   channel writes, keepalives, raw bytes, and pauses, then collects
//!   everything the peer sends back
//! - **FakeLampDriver**: a scriptable [`dsky_link::LampDriver`] that
//!   records every issued command
//! - **FakeLivenessProbe**: a settable [`dsky_link::LivenessProbe`]
//!   standing in for the UI-server process check
//!
//! # Example
//!
//! ```no_run
//! use dsky_sim::{AgcStep, ScriptedAgc};
//!
//! # async fn demo() -> std::io::Result<()> {
//! let agc = ScriptedAgc::bind(vec![
//!     AgcStep::Keepalive,
//!     AgcStep::Update { channel: 0o11, value: 0o2 },
//! ])
//! .await?;
//! let addr = agc.addr();
//!
//! // Point the link at `addr`, then:
//! let inbound = agc.run().await?;
//! println!("peer sent {} bytes", inbound.len());
//! # Ok(())
//! # }
//! ```

pub mod agc;
pub mod driver;

pub use agc::{AgcStep, ScriptedAgc};
pub use driver::{FakeLampDriver, FakeLivenessProbe};
