//! Scripted emulator endpoint
//!
//! Stands in for yaAGC's peripheral socket: accepts one connection,
//! plays a fixed script of outbound traffic, then drains the peer's
//! transmissions until it disconnects.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use agc_wire::{ChannelWord, FRAME_LEN, KEEPALIVE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::debug;

/// One step of a [`ScriptedAgc`] script
#[derive(Debug, Clone)]
pub enum AgcStep {
    /// Write one channel value as a bare data frame
    Update {
        /// Channel number
        channel: u8,
        /// Channel value
        value: u16,
    },
    /// Write an all-ones keepalive frame
    Keepalive,
    /// Write arbitrary bytes (for corruption and resync scenarios)
    Raw(Vec<u8>),
    /// Pause before the next step
    Wait(Duration),
}

/// A one-shot scripted emulator
///
/// Binds an ephemeral localhost port at construction so the peer's
/// address is known before the script runs.
pub struct ScriptedAgc {
    listener: TcpListener,
    addr: SocketAddr,
    script: Vec<AgcStep>,
}

impl ScriptedAgc {
    /// Bind a listener on an ephemeral localhost port
    pub async fn bind(script: Vec<AgcStep>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            script,
        })
    }

    /// The address the peer should connect to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept one peer, play the script, then read until the peer
    /// disconnects. Returns every byte the peer sent.
    pub async fn run(self) -> io::Result<Vec<u8>> {
        let (mut stream, peer) = self.listener.accept().await?;
        debug!(%peer, "scripted emulator accepted a peer");

        for step in &self.script {
            match step {
                AgcStep::Update { channel, value } => {
                    let word = ChannelWord {
                        channel: *channel,
                        value: *value,
                    };
                    stream.write_all(&word.encode()).await?;
                }
                AgcStep::Keepalive => stream.write_all(&KEEPALIVE).await?,
                AgcStep::Raw(bytes) => stream.write_all(bytes).await?,
                AgcStep::Wait(delay) => sleep(*delay).await,
            }
        }
        stream.flush().await?;

        let mut inbound = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => inbound.extend_from_slice(&buf[..n]),
                // The peer may reset rather than close cleanly.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => break,
                Err(e) => return Err(e),
            }
        }
        debug!(bytes = inbound.len(), "peer disconnected");
        Ok(inbound)
    }
}
