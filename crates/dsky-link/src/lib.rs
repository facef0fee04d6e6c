//! DSKY link engine
//!
//! Connects a DSKY front panel to a running yaAGC emulator and keeps
//! the two in sync. The engine owns everything except rendering:
//!
//! - **Transport**: TCP client with bounded retry ([`link::connect_to_agc`]),
//!   or a recorded log replayed with faithful timing ([`record::Playback`]).
//! - **State**: a [`cache::ChannelStateCache`] that masks each inbound
//!   channel word down to its display-relevant bits and forwards only
//!   genuine changes.
//! - **Lamps**: a [`lamps::LampPanel`] aggregating lamp bits from three
//!   channels into whole-panel device commands, flushed through a
//!   debounced, overlap-avoiding [`scheduler::LampScheduler`].
//! - **Keys**: queued [`agc_wire::KeySymbol`]s are encoded and
//!   transmitted one per pulse, so presses are never lost or reordered.
//!
//! The rendering consumer subscribes to a broadcast stream of
//! [`LinkEvent`]s and feeds key symbols into an mpsc queue; it never
//! touches the transport directly.
//!
//! # Example
//!
//! ```no_run
//! use dsky_link::{run_link_task, LinkConfig, LinkEvent, LinkSource};
//! use tokio::sync::{broadcast, mpsc, watch};
//!
//! # async fn demo() -> Result<(), dsky_link::LinkError> {
//! let config = LinkConfig::default();
//! let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
//! let stream = dsky_link::connect_to_agc(&config, &mut shutdown_rx).await?;
//!
//! let (key_tx, key_rx) = mpsc::channel(32);
//! let (event_tx, mut event_rx) = broadcast::channel(64);
//! let (lamp_tx, lamp_rx) = watch::channel(Default::default());
//!
//! tokio::spawn(run_link_task(
//!     LinkSource::Live(stream),
//!     config,
//!     key_rx,
//!     event_tx,
//!     lamp_tx,
//!     None,
//! ));
//!
//! while let Ok(event) = event_rx.recv().await {
//!     if let LinkEvent::Channel(change) = event {
//!         println!("channel 0o{:o} = 0o{:o}", change.channel, change.value);
//!     }
//! }
//! # let _ = (key_tx, lamp_rx, shutdown_tx);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod lamps;
pub mod link;
pub mod record;
pub mod scheduler;

pub use cache::{CacheOutcome, ChannelEvent, ChannelStateCache};
pub use config::LinkConfig;
pub use error::LinkError;
pub use events::LinkEvent;
pub use lamps::{Lamp, LampCommand, LampPanel, LivenessProbe};
pub use link::{connect_to_agc, run_link_task, LinkSource};
pub use record::{Playback, Recorder};
pub use scheduler::{run_lamp_task, LampDriver, LampScheduler};
