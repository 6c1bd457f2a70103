//! # Packet Transport
//!
//! Where encoded joystick packets go after each poll tick.
//!
//! The robot-side UDP framing lives outside this crate; the driver only needs
//! something that accepts a finished packet.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{JoystickError, Result};

/// Destination for encoded joystick packets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PacketSink: Send {
    /// Hands off one packet.
    async fn send(&mut self, packet: Bytes) -> Result<()>;
}

/// Sink that forwards packets over a bounded channel.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use frc_ds_joystick::transport::{ChannelSink, PacketSink};
///
/// # tokio_test::block_on(async {
/// let (mut sink, mut rx) = ChannelSink::channel(4);
/// sink.send(Bytes::from_static(&[1, 2])).await.unwrap();
/// assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(&[1, 2]));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Wraps an existing sender.
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver paired with it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl PacketSink for ChannelSink {
    /// Never waits: a full channel drops the packet so the poll loop keeps
    /// its cadence.
    async fn send(&mut self, packet: Bytes) -> Result<()> {
        self.tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => {
                JoystickError::Transport("Packet receiver lagging, packet dropped".to_string())
            }
            TrySendError::Closed(_) => {
                JoystickError::Transport("Packet receiver closed".to_string())
            }
        })
    }
}
