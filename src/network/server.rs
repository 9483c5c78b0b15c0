//! DSP server
//!
//! Accepts one client at a time and answers every request block with its
//! spectrally processed counterpart. Further clients wait in the listen
//! queue until the current session ends.
//!
//! Each connection runs as a [`ServerSession`] with its own id, counters and
//! working buffers; the transform plans are created once at startup and
//! lent to whichever session is live.

use bytes::BytesMut;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use uuid::Uuid;

use crate::audio::block::Block;
use crate::config::DspConfig;
use crate::constants::LISTEN_BACKLOG;
use crate::dsp::SpectralEngine;
use crate::error::Result;
use crate::network::socket::create_listener;
use crate::protocol::BlockCodec;

/// Summary of a finished client session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: Uuid,
    pub peer: SocketAddr,
    pub blocks: u64,
}

/// Spectral DSP server bound to a listening socket
pub struct DspServer {
    listener: TcpListener,
    engine: SpectralEngine,
    sessions_served: u64,
}

impl DspServer {
    /// Plan the transforms and bind the listener
    ///
    /// Must be called from within a Tokio runtime. Failure here is fatal to
    /// the server: there is no per-block failure path once this succeeds.
    pub fn bind(addr: SocketAddr, block_len: usize, dsp: DspConfig) -> Result<Self> {
        let engine = SpectralEngine::new(block_len, dsp)?;
        let listener = TcpListener::from_std(create_listener(addr, LISTEN_BACKLOG)?)?;

        tracing::info!(
            "DSP server listening on {} ({} samples/block, high band gain {})",
            listener.local_addr()?,
            block_len,
            dsp.high_band_gain
        );

        Ok(Self {
            listener,
            engine,
            sessions_served: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients one after another until `shutdown` turns true
    ///
    /// Returns the number of sessions served.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<u64> {
        tracing::info!("DSP server ready. Waiting for client...");

        while !*shutdown.borrow() {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = shutdown.changed() => break,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let session = ServerSession::new(peer, &mut self.engine);
            let summary = session.run(stream, &mut shutdown).await;
            self.sessions_served += 1;

            tracing::info!(
                "Session {} with {} ended after {} blocks",
                summary.id,
                summary.peer,
                summary.blocks
            );
        }

        tracing::info!("DSP server shutting down after {} sessions", self.sessions_served);
        Ok(self.sessions_served)
    }
}

/// One client connection
pub struct ServerSession<'a> {
    id: Uuid,
    peer: SocketAddr,
    engine: &'a mut SpectralEngine,
    codec: BlockCodec,
    frame: BytesMut,
    input: Block,
    output: Block,
    blocks: u64,
}

impl<'a> ServerSession<'a> {
    pub fn new(peer: SocketAddr, engine: &'a mut SpectralEngine) -> Self {
        let block_len = engine.block_len();
        let codec = BlockCodec::new(block_len);

        Self {
            id: Uuid::new_v4(),
            peer,
            engine,
            codec,
            frame: BytesMut::zeroed(codec.frame_len()),
            input: Block::zeroed(block_len),
            output: Block::zeroed(block_len),
            blocks: 0,
        }
    }

    /// Answer request blocks until the client leaves or shutdown is signalled
    pub async fn run(
        mut self,
        mut stream: TcpStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionSummary {
        tracing::info!("Client {} connected (session {})", self.peer, self.id);
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        loop {
            let read = tokio::select! {
                read = stream.read_exact(&mut self.frame[..]) => read,
                _ = shutdown.changed() => {
                    tracing::info!("Closing session {} for shutdown", self.id);
                    break;
                }
            };

            if let Err(e) = read {
                if e.kind() == ErrorKind::UnexpectedEof {
                    tracing::info!("Client {} disconnected", self.peer);
                } else {
                    tracing::warn!("Receive from {} failed: {}", self.peer, e);
                }
                break;
            }

            if let Err(e) = self.process_frame() {
                tracing::error!("Session {} failed to process block: {}", self.id, e);
                break;
            }

            // A client that stops reading must not hold up shutdown
            let written = tokio::select! {
                written = stream.write_all(&self.frame) => written,
                _ = shutdown.changed() => {
                    tracing::info!("Closing session {} for shutdown", self.id);
                    break;
                }
            };

            if let Err(e) = written {
                tracing::warn!("Send to {} failed: {}", self.peer, e);
                break;
            }
            self.blocks += 1;
        }

        SessionSummary {
            id: self.id,
            peer: self.peer,
            blocks: self.blocks,
        }
    }

    /// Replace the request frame in `self.frame` with the response frame
    fn process_frame(&mut self) -> Result<()> {
        self.codec.decode(&self.frame, &mut self.input)?;
        self.engine.process(&self.input, &mut self.output)?;

        self.frame.clear();
        self.codec.encode(&self.output, &mut self.frame)?;
        Ok(())
    }
}
