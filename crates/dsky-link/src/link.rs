//! The link task
//!
//! A single cooperative polling loop owns all non-graphical processing:
//! it decodes inbound bytes (or polls the playback log), pushes genuine
//! channel changes to the event stream, the recorder, and the lamp
//! scheduler, and drains one queued key event per tick, encoding it
//! outward. A separate thread of control (outside this crate) owns the
//! rendering surface and feeds key symbols into the queue, so no press
//! or release is ever lost or reordered.

use std::time::{Duration, Instant};

use agc_wire::{AgcCodec, ChannelUpdate, ChannelWord, KeyOutcome, KeySymbol, Keypad};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{CacheOutcome, ChannelStateCache, CHANNEL_INDICATORS};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::LinkEvent;
use crate::lamps::{Lamp, LampCommand, LampPanel, LivenessProbe};
use crate::record::{Playback, Recorder};

/// Fixed backoff between connection attempts
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Verb/noun flash half-period
const VN_FLASH_PERIOD: Duration = Duration::from_millis(750);

/// Flash-request bit on the indicator channel
const VN_FLASH_BIT: u16 = 0x20;

/// COMP ACTY bit on the indicator channel
const COMP_ACTY_BIT: u16 = 0x02;

/// How often the UI-server liveness probe runs
const LIVENESS_POLL_PERIOD: Duration = Duration::from_secs(10);

/// Where decoded channel words come from
pub enum LinkSource {
    /// A live emulator connection
    Live(TcpStream),
    /// A recorded log; outbound traffic is discarded in this mode
    Playback(Playback),
}

/// Connect to the emulator, retrying with fixed backoff
///
/// Bounded by `config.connect_attempts`; the shutdown signal aborts the
/// wait at any point.
pub async fn connect_to_agc(
    config: &LinkConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<TcpStream, LinkError> {
    for attempt in 1..=config.connect_attempts {
        tokio::select! {
            result = TcpStream::connect((config.host.as_str(), config.port)) => match result {
                Ok(stream) => {
                    info!("connected to yaAGC ({}:{})", config.host, config.port);
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        "could not connect to yaAGC ({}:{}): {}", config.host, config.port, e
                    );
                }
            },
            _ = wait_for_shutdown(shutdown) => return Err(LinkError::Cancelled),
        }

        tokio::select! {
            _ = sleep(CONNECT_BACKOFF) => {}
            _ = wait_for_shutdown(shutdown) => return Err(LinkError::Cancelled),
        }
    }

    Err(LinkError::ConnectFailed {
        host: config.host.clone(),
        port: config.port,
        attempts: config.connect_attempts,
    })
}

/// Resolve when the shutdown flag is raised; pend forever if the sender
/// goes away without raising it.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Non-graphical state owned by the link task
struct LinkState {
    cache: ChannelStateCache,
    panel: LampPanel,
    keypad: Keypad,
    recorder: Option<Recorder>,
    event_tx: broadcast::Sender<LinkEvent>,
    lamp_tx: watch::Sender<LampCommand>,
    vn_flashing: bool,
    comp_acty: bool,
}

/// What to do with a key the panel pressed
enum KeyDisposition {
    /// Encode and transmit this update
    Send(ChannelUpdate),
    /// Stop the link
    Shutdown,
    /// Nothing to transmit
    None,
}

impl LinkState {
    /// Route one decoded word through the cache and, on a genuine
    /// change, to the recorder, the event stream, and the lamp panel.
    fn handle_word(&mut self, word: ChannelWord) {
        let event = match self.cache.update(word) {
            CacheOutcome::Changed(event) => event,
            CacheOutcome::Unchanged | CacheOutcome::Ignored => return,
        };

        // Record the raw word, not the masked event value: the display
        // channel's sub-address lives in the bits the mask strips, and
        // replay needs it back.
        if let Some(recorder) = &mut self.recorder {
            recorder.record(word.channel, word.value);
        }

        if event.channel == CHANNEL_INDICATORS {
            let flash = event.value & VN_FLASH_BIT != 0;
            if flash != self.vn_flashing {
                self.vn_flashing = flash;
                if !flash {
                    // Leave the digits visible when flashing stops.
                    let _ = self.event_tx.send(LinkEvent::VerbNounFlash(true));
                }
            }

            let comp_acty = event.value & COMP_ACTY_BIT != 0;
            if comp_acty != self.comp_acty {
                self.comp_acty = comp_acty;
                let _ = self.event_tx.send(LinkEvent::CompActy(comp_acty));
            }
        }

        debug!(
            "channel 0o{:o} -> 0o{:o} (relay {:?})",
            event.channel, event.value, event.relay
        );
        let _ = self.event_tx.send(LinkEvent::Channel(event));

        if self.panel.apply(&event) {
            let _ = self.lamp_tx.send(self.panel.command());
        }
    }

    fn handle_key(&mut self, key: KeySymbol) -> KeyDisposition {
        match self.keypad.press(key) {
            KeyOutcome::Update(update) => {
                debug!(
                    "sending to yaAGC: 0o{:o} (mask 0o{:o}) -> channel 0o{:o}",
                    update.value(),
                    update.mask(),
                    update.channel()
                );
                KeyDisposition::Send(update)
            }
            KeyOutcome::RequestShutdown => {
                info!("shutdown chord keyed, stopping link");
                let _ = self.event_tx.send(LinkEvent::ShutdownRequested);
                KeyDisposition::Shutdown
            }
            KeyOutcome::Ignored => KeyDisposition::None,
        }
    }
}

/// Run the link's polling loop until disconnect or shutdown
///
/// Per tick, in sequence: inbound decode (live) or at most one playback
/// emission, then at most one queued key event. Key updates are encoded
/// and transmitted in live mode and discarded in playback mode. When a
/// liveness probe is supplied it is polled on its own timer and drives
/// the [`Lamp::UiServer`] panel lamp.
///
/// On exit the loop's timers stop first, then the lamp feed closes (the
/// scheduler task finishes any pending flush and returns its driver),
/// and the transport is shut down last.
pub async fn run_link_task(
    source: LinkSource,
    config: LinkConfig,
    mut key_rx: mpsc::Receiver<KeySymbol>,
    event_tx: broadcast::Sender<LinkEvent>,
    lamp_tx: watch::Sender<LampCommand>,
    probe: Option<Box<dyn LivenessProbe>>,
) -> Result<(), LinkError> {
    let recorder = match &config.record_path {
        Some(path) => match Recorder::create(path) {
            Ok(recorder) => Some(recorder),
            Err(e) => {
                // Recording is best-effort; live operation continues.
                warn!("cannot open record file: {}", e);
                None
            }
        },
        None => None,
    };

    let (mut stream, mut playback) = match source {
        LinkSource::Live(stream) => (Some(stream), None),
        LinkSource::Playback(playback) => (None, Some(playback)),
    };

    let mut state = LinkState {
        cache: ChannelStateCache::new(),
        panel: LampPanel::new(),
        keypad: Keypad::new(),
        recorder,
        event_tx,
        lamp_tx,
        vn_flashing: false,
        comp_acty: false,
    };

    if stream.is_some() {
        let _ = state.event_tx.send(LinkEvent::Connected);
    }

    let mut codec = AgcCodec::new();
    let mut buf = [0u8; 256];

    let mut tick = interval(config.pulse());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut flash_timer = interval(VN_FLASH_PERIOD);
    let mut liveness_timer = interval(LIVENESS_POLL_PERIOD);
    let mut flash_on = true;
    let mut playback_finished = false;
    let mut corrupt_seen = 0u64;

    let result = loop {
        let was_flashing = state.vn_flashing;

        tokio::select! {
            result = read_some(&mut stream, &mut buf), if stream.is_some() => match result {
                Ok(0) => {
                    info!("yaAGC closed the connection");
                    let _ = state.event_tx.send(LinkEvent::Disconnected);
                    break Ok(());
                }
                Ok(n) => {
                    codec.push_bytes(&buf[..n]);
                    while let Some(word) = codec.next_word() {
                        state.handle_word(word);
                    }
                    let total = codec.corrupt_frames();
                    if total > corrupt_seen {
                        corrupt_seen = total;
                        let _ = state.event_tx.send(LinkEvent::FramingError { total });
                    }
                }
                Err(e) => {
                    warn!("transport read failed: {}", e);
                    let _ = state.event_tx.send(LinkEvent::Disconnected);
                    break Err(LinkError::Io(e));
                }
            },

            _ = tick.tick() => {
                if let Some(pb) = playback.as_mut() {
                    // One event per tick keeps replay interleaved with
                    // key handling.
                    if let Some(word) = pb.poll(Instant::now()) {
                        state.handle_word(word);
                    } else if pb.is_finished() && !playback_finished {
                        playback_finished = true;
                        info!("playback finished");
                        let _ = state.event_tx.send(LinkEvent::PlaybackFinished);
                    }
                }

                match key_rx.try_recv() {
                    Ok(key) => match state.handle_key(key) {
                        KeyDisposition::Send(update) => {
                            if let Some(s) = stream.as_mut() {
                                if let Err(e) = s.write_all(&update.encode()).await {
                                    warn!("transport write failed: {}", e);
                                    break Err(LinkError::Io(e));
                                }
                            }
                        }
                        KeyDisposition::Shutdown => break Ok(()),
                        KeyDisposition::None => {}
                    },
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        info!("key queue closed, stopping link");
                        break Ok(());
                    }
                }
            },

            _ = flash_timer.tick(), if state.vn_flashing => {
                flash_on = !flash_on;
                let _ = state.event_tx.send(LinkEvent::VerbNounFlash(flash_on));
            }

            _ = liveness_timer.tick(), if probe.is_some() => {
                if let Some(probe) = probe.as_deref() {
                    if state.panel.set(Lamp::UiServer, probe.is_alive()) {
                        let _ = state.lamp_tx.send(state.panel.command());
                    }
                }
            }
        }

        if state.vn_flashing != was_flashing {
            flash_on = true;
            if state.vn_flashing {
                flash_timer.reset();
            }
        }
    };

    // Teardown order matters: timers first, then the lamp feed, then
    // the transport.
    drop(liveness_timer);
    drop(flash_timer);
    drop(tick);
    drop(state);
    if let Some(mut s) = stream.take() {
        let _ = s.shutdown().await;
    }
    result
}

/// Read from the live stream, or pend forever in playback mode
async fn read_some(stream: &mut Option<TcpStream>, buf: &mut [u8]) -> std::io::Result<usize> {
    match stream {
        Some(s) => s.read(buf).await,
        None => std::future::pending().await,
    }
}
