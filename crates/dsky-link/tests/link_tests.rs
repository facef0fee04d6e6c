//! Integration tests for the DSKY link engine
//!
//! These tests drive the full link task against a scripted emulator
//! endpoint and verify:
//! - Key presses encoded and transmitted in order
//! - Keepalive and corruption transparency on the inbound path
//! - Change detection and masking on the channel cache
//! - The lamp pipeline through the debounced scheduler
//! - Playback mode and the RSET shutdown chord
//! - Bounded connection retry

use std::time::Duration;

use agc_wire::{ChannelUpdate, KeySymbol};
use dsky_link::{
    connect_to_agc, run_lamp_task, run_link_task, ChannelEvent, LampCommand, LampScheduler,
    LinkConfig, LinkError, LinkEvent, LinkSource, LivenessProbe,
};
use dsky_sim::{AgcStep, FakeLampDriver, FakeLivenessProbe, ScriptedAgc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub const EVENT_WAIT: Duration = Duration::from_secs(5);

    /// Route link tracing into the test harness output
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// A running link task plus the channels a renderer would hold
    pub struct Harness {
        pub key_tx: mpsc::Sender<KeySymbol>,
        pub event_rx: broadcast::Receiver<LinkEvent>,
        pub lamp_rx: watch::Receiver<LampCommand>,
        pub link: JoinHandle<Result<(), LinkError>>,
    }

    /// Fast timings so tests don't wait on production-scale pulses
    pub fn fast_config(addr: std::net::SocketAddr) -> LinkConfig {
        LinkConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            pulse_ms: 5,
            lamp_deadtime_ms: 5,
            ..LinkConfig::default()
        }
    }

    /// Connect to a scripted emulator and spawn the link task
    pub async fn start_live_link(config: LinkConfig) -> Harness {
        start_live_link_with_probe(config, None).await
    }

    /// As [`start_live_link`], with a UI liveness probe attached
    pub async fn start_live_link_with_probe(
        config: LinkConfig,
        probe: Option<Box<dyn LivenessProbe>>,
    ) -> Harness {
        init_tracing();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stream = connect_to_agc(&config, &mut shutdown_rx)
            .await
            .expect("scripted emulator should accept");

        let (key_tx, key_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = broadcast::channel(64);
        let (lamp_tx, lamp_rx) = watch::channel(LampCommand::default());

        let link = tokio::spawn(run_link_task(
            LinkSource::Live(stream),
            config,
            key_rx,
            event_tx,
            lamp_tx,
            probe,
        ));

        Harness {
            key_tx,
            event_rx,
            lamp_rx,
            link,
        }
    }

    /// Spawn the link task over a playback source
    pub fn start_playback_link(playback: dsky_link::Playback, config: LinkConfig) -> Harness {
        init_tracing();
        let (key_tx, key_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = broadcast::channel(64);
        let (lamp_tx, lamp_rx) = watch::channel(LampCommand::default());

        let link = tokio::spawn(run_link_task(
            LinkSource::Playback(playback),
            config,
            key_rx,
            event_tx,
            lamp_tx,
            None,
        ));

        Harness {
            key_tx,
            event_rx,
            lamp_rx,
            link,
        }
    }

    /// Receive events until the next forwarded channel change
    pub async fn next_channel_event(rx: &mut broadcast::Receiver<LinkEvent>) -> ChannelEvent {
        loop {
            let event = timeout(EVENT_WAIT, rx.recv())
                .await
                .expect("timed out waiting for a channel event")
                .expect("event stream closed unexpectedly");
            if let LinkEvent::Channel(change) = event {
                return change;
            }
        }
    }

    /// Receive events until one matches the predicate
    pub async fn wait_for(
        rx: &mut broadcast::Receiver<LinkEvent>,
        mut pred: impl FnMut(&LinkEvent) -> bool,
    ) -> LinkEvent {
        loop {
            let event = timeout(EVENT_WAIT, rx.recv())
                .await
                .expect("timed out waiting for an event")
                .expect("event stream closed unexpectedly");
            if pred(&event) {
                return event;
            }
        }
    }

    /// The expected wire bytes for one keyboard code
    pub fn key_frames(code: u16) -> [u8; 8] {
        ChannelUpdate::new(0o15, code, 0o37).unwrap().encode()
    }
}

// ============================================================================
// Outbound Key Path
// ============================================================================

mod key_tests {
    use super::*;

    #[tokio::test]
    async fn verb_35_entry_reaches_the_emulator_in_order() {
        let agc = ScriptedAgc::bind(vec![]).await.unwrap();
        let config = helpers::fast_config(agc.addr());
        let agc_task = tokio::spawn(agc.run());

        let harness = helpers::start_live_link(config).await;
        for key in [
            KeySymbol::Verb,
            KeySymbol::Digit(3),
            KeySymbol::Digit(5),
            KeySymbol::Enter,
        ] {
            harness.key_tx.send(key).await.unwrap();
        }
        // Closing the key queue ends the link after the queue drains.
        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();

        let inbound = agc_task.await.unwrap().unwrap();
        let mut expected = Vec::new();
        for code in [0o21u16, 0o3, 0o5, 0o34] {
            expected.extend_from_slice(&helpers::key_frames(code));
        }
        assert_eq!(inbound, expected);
    }

    #[tokio::test]
    async fn fifth_reset_requests_shutdown_and_stops_the_link() {
        let agc = ScriptedAgc::bind(vec![]).await.unwrap();
        let config = helpers::fast_config(agc.addr());
        let agc_task = tokio::spawn(agc.run());

        let mut harness = helpers::start_live_link(config).await;
        for _ in 0..5 {
            harness.key_tx.send(KeySymbol::Reset).await.unwrap();
        }

        helpers::wait_for(&mut harness.event_rx, |e| {
            matches!(e, LinkEvent::ShutdownRequested)
        })
        .await;
        harness.link.await.unwrap().unwrap();

        // Only the first four presses went out; the fifth became the
        // shutdown request.
        let inbound = agc_task.await.unwrap().unwrap();
        let mut expected = Vec::new();
        for _ in 0..4 {
            expected.extend_from_slice(&helpers::key_frames(0o22));
        }
        assert_eq!(inbound, expected);
    }
}

// ============================================================================
// Inbound Channel Path
// ============================================================================

mod channel_tests {
    use super::*;

    #[tokio::test]
    async fn keepalives_and_corruption_are_transparent() {
        let agc = ScriptedAgc::bind(vec![
            AgcStep::Keepalive,
            // A stray byte ahead of a valid frame forces a resync.
            AgcStep::Raw(vec![0xAA]),
            AgcStep::Update {
                channel: 0o163,
                value: 0o200,
            },
            AgcStep::Keepalive,
            AgcStep::Update {
                channel: 0o11,
                value: 0o4,
            },
        ])
        .await
        .unwrap();
        let config = helpers::fast_config(agc.addr());
        let agc_task = tokio::spawn(agc.run());

        let mut harness = helpers::start_live_link(config).await;

        // Relative order of the framing report and the channel events
        // depends on how the transport chunks the script, so collect
        // until all three have arrived.
        let mut changes = Vec::new();
        let mut framing_total = 0;
        while changes.len() < 2 || framing_total == 0 {
            match timeout(helpers::EVENT_WAIT, harness.event_rx.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event stream closed unexpectedly")
            {
                LinkEvent::Channel(change) => changes.push(change),
                LinkEvent::FramingError { total } => framing_total = total,
                _ => {}
            }
        }

        assert_eq!((changes[0].channel, changes[0].value), (0o163, 0o200));
        assert_eq!((changes[1].channel, changes[1].value), (0o11, 0o4));
        // The stray byte was the only corruption; keepalives don't count.
        assert_eq!(framing_total, 1);

        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
        agc_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn repeats_and_irrelevant_bits_are_not_forwarded() {
        let agc = ScriptedAgc::bind(vec![
            AgcStep::Update {
                channel: 0o163,
                value: 0o200,
            },
            // Same masked value twice over: nothing new to forward.
            AgcStep::Update {
                channel: 0o163,
                value: 0o200,
            },
            AgcStep::Update {
                channel: 0o163,
                value: 0o200 | 0o7, // bits outside the 0o720 mask
            },
            // A genuinely different masked value.
            AgcStep::Update {
                channel: 0o163,
                value: 0o600,
            },
        ])
        .await
        .unwrap();
        let config = helpers::fast_config(agc.addr());
        let agc_task = tokio::spawn(agc.run());

        let mut harness = helpers::start_live_link(config).await;

        let first = helpers::next_channel_event(&mut harness.event_rx).await;
        assert_eq!(first.value, 0o200);
        let second = helpers::next_channel_event(&mut harness.event_rx).await;
        assert_eq!(second.value, 0o600);

        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
        agc_task.await.unwrap().unwrap();
    }
}

// ============================================================================
// Lamp Pipeline
// ============================================================================

mod lamp_tests {
    use super::*;
    use dsky_link::Lamp;

    #[tokio::test]
    async fn restart_lamp_flows_through_the_scheduler_to_the_driver() {
        let agc = ScriptedAgc::bind(vec![AgcStep::Update {
            channel: 0o163,
            value: 0o200,
        }])
        .await
        .unwrap();
        let config = helpers::fast_config(agc.addr());
        let deadtime = config.lamp_deadtime();
        let agc_task = tokio::spawn(agc.run());

        let mut harness = helpers::start_live_link(config).await;
        let driver = FakeLampDriver::new();
        let scheduler = LampScheduler::new(driver.clone(), deadtime);
        let lamp_task = tokio::spawn(run_lamp_task(scheduler, harness.lamp_rx.clone()));
        drop(harness.lamp_rx);

        helpers::next_channel_event(&mut harness.event_rx).await;
        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
        agc_task.await.unwrap().unwrap();

        // The link ended, so the lamp task flushes and returns.
        let scheduler = lamp_task.await.unwrap();

        let issued = driver
            .last_issued()
            .expect("the restart lamp should have been issued");
        assert!(issued.cli.contains(Lamp::Restart.cli_token()));
        assert_eq!(issued.registers[4] & 0x07, 0x07);
        assert_eq!(scheduler.last_issued(), Some(&issued));
    }

    #[tokio::test]
    async fn liveness_probe_drives_the_ui_server_lamp() {
        let agc = ScriptedAgc::bind(vec![]).await.unwrap();
        let config = helpers::fast_config(agc.addr());
        let agc_task = tokio::spawn(agc.run());

        let probe = FakeLivenessProbe::new(true);
        let mut harness =
            helpers::start_live_link_with_probe(config, Some(Box::new(probe))).await;

        // The probe's first poll runs at startup and lights the lamp.
        timeout(helpers::EVENT_WAIT, harness.lamp_rx.changed())
            .await
            .expect("timed out waiting for a lamp command")
            .expect("lamp feed closed unexpectedly");
        let command = harness.lamp_rx.borrow_and_update().clone();
        assert!(command.cli.contains(Lamp::UiServer.cli_token()));
        assert_eq!(command.registers[1] & 0x80, 0x80);

        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
        agc_task.await.unwrap().unwrap();
    }
}

// ============================================================================
// Playback Mode
// ============================================================================

mod playback_tests {
    use super::*;
    use dsky_link::Playback;

    #[tokio::test]
    async fn recorded_log_replays_through_the_full_pipeline() {
        let path = std::env::temp_dir().join(format!("dsky-replay-{}.txt", std::process::id()));
        std::fs::write(&path, "0 163 200\n40 11 4\n").unwrap();
        let playback = Playback::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let config = LinkConfig {
            pulse_ms: 5,
            ..LinkConfig::default()
        };
        let mut harness = helpers::start_playback_link(playback, config);

        let first = helpers::next_channel_event(&mut harness.event_rx).await;
        assert_eq!(first.channel, 0o163);
        let second = helpers::next_channel_event(&mut harness.event_rx).await;
        assert_eq!(second.channel, 0o11);

        helpers::wait_for(&mut harness.event_rx, |e| {
            matches!(e, LinkEvent::PlaybackFinished)
        })
        .await;

        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn recording_preserves_display_sub_addresses() {
        use dsky_link::{CacheOutcome, ChannelStateCache};

        // Relay 12 with two lamp bits: the sub-address lives in value
        // bits 11-14, which the cache masks out of forwarded events.
        let raw = (12u16 << 11) | 0x0C;
        let agc = ScriptedAgc::bind(vec![AgcStep::Update {
            channel: 0o10,
            value: raw,
        }])
        .await
        .unwrap();
        let path =
            std::env::temp_dir().join(format!("dsky-link-record-{}.txt", std::process::id()));
        let mut config = helpers::fast_config(agc.addr());
        config.record_path = Some(path.clone());
        let agc_task = tokio::spawn(agc.run());

        let mut harness = helpers::start_live_link(config).await;
        let event = helpers::next_channel_event(&mut harness.event_rx).await;
        assert_eq!(event.relay, Some(12));
        drop(harness.key_tx);
        harness.link.await.unwrap().unwrap();
        agc_task.await.unwrap().unwrap();

        // The log must hold the raw word, so a replay re-derives the
        // sub-address instead of reading relay 0 and dropping it.
        let mut playback = Playback::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let word = playback
            .poll(std::time::Instant::now())
            .expect("the recorded event should replay");
        assert_eq!(word.channel, 0o10);
        assert_eq!(word.value, raw);

        let mut cache = ChannelStateCache::new();
        match cache.update(word) {
            CacheOutcome::Changed(replayed) => {
                assert_eq!(replayed.relay, Some(12));
                assert_eq!(replayed.value, 0x0C);
            }
            other => panic!("replayed display word was dropped: {:?}", other),
        }
    }
}

// ============================================================================
// Connection Handling
// ============================================================================

mod connect_tests {
    use super::*;

    #[tokio::test]
    async fn retry_is_bounded_by_the_configured_attempts() {
        // Bind then drop a listener so the port is known to refuse.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = LinkConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            connect_attempts: 1,
            ..LinkConfig::default()
        };

        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let err = connect_to_agc(&config, &mut shutdown_rx).await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectFailed { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn emulator_disconnect_ends_the_link_cleanly() {
        use agc_wire::ChannelWord;
        use tokio::io::AsyncWriteExt;

        // A bare listener that writes one frame then hangs up, which
        // ScriptedAgc never does (it waits for the peer to close).
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let agc_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let word = ChannelWord {
                channel: 0o11,
                value: 0o2,
            };
            stream.write_all(&word.encode()).await.unwrap();
        });

        let mut harness = helpers::start_live_link(helpers::fast_config(addr)).await;

        helpers::next_channel_event(&mut harness.event_rx).await;
        harness.link.await.unwrap().unwrap();
        // The Disconnected event stays buffered in the broadcast queue
        // even after the task's sender is gone.
        helpers::wait_for(&mut harness.event_rx, |e| {
            matches!(e, LinkEvent::Disconnected)
        })
        .await;
        agc_task.await.unwrap();
    }
}
