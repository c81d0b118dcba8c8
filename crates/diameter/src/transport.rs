use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use crate::message::{frame_length, Message};
use crate::{DiameterError, Result};

const MIN_FRAME: usize = 20;
const MAX_FRAME: usize = 1 << 20;

/// Outbound half of a Diameter peer connection. Inbound messages arrive on
/// the channel handed out at connect time.
#[async_trait]
pub trait DiameterTransport: Send + Sync {
    async fn send(&self, frame: Bytes) -> Result<()>;
}

/// TCP transport with Diameter length-field framing.
pub struct TcpTransport {
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpTransport {
    /// Connect to a peer and return the transport plus the stream of
    /// decoded inbound messages. The read loop ends when the peer closes.
    pub async fn connect(addr: &str) -> Result<(Arc<Self>, mpsc::Receiver<Message>)> {
        let stream = TcpStream::connect(addr).await?;
        tracing::info!(peer = addr, "Connected to Diameter peer");
        let (mut read_half, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            loop {
                let mut header = [0u8; 4];
                if read_half.read_exact(&mut header).await.is_err() {
                    break;
                }
                let total = frame_length(&header);
                if !(MIN_FRAME..=MAX_FRAME).contains(&total) {
                    tracing::warn!(length = total, "Unframeable message length; closing");
                    break;
                }

                let mut rest = vec![0u8; total - 4];
                if read_half.read_exact(&mut rest).await.is_err() {
                    break;
                }
                let mut frame = Vec::with_capacity(total);
                frame.extend_from_slice(&header);
                frame.extend_from_slice(&rest);

                match Message::decode(Bytes::from(frame)) {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping undecodable frame"),
                }
            }
            tracing::info!("Diameter read loop ended");
        });

        Ok((Arc::new(Self { writer: Mutex::new(writer) }), rx))
    }
}

#[async_trait]
impl DiameterTransport for TcpTransport {
    async fn send(&self, frame: Bytes) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| DiameterError::Transport(e.to_string()))
    }
}

/// Loopback transport: every sent frame is decoded and handed to the
/// holder of the receiver. Stands in for an HSS peer in tests.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl DiameterTransport for ChannelTransport {
    async fn send(&self, frame: Bytes) -> Result<()> {
        let message = Message::decode(frame)?;
        self.tx.send(message).map_err(|_| DiameterError::Closed)
    }
}
