//! Message Transport
//!
//! Seam between the player manager and whatever carries messages to the
//! remote player. Delivery is assumed reliable and ordered per route; the
//! manager treats every send as fire-and-forget.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use fos_ipc::{FrameDecoder, IpcChannel, MessageFrame};

use crate::error::TransportError;
use crate::protocol::{HostMessage, PlayerMessage, Routed};

/// Carrier for routed player messages
pub trait MediaTransport {
    /// Hand one command to the transport
    fn send(&mut self, message: Routed<HostMessage>) -> Result<(), TransportError>;

    /// Notifications that have arrived since the last poll, in arrival order
    fn poll_incoming(&mut self) -> Result<Vec<Routed<PlayerMessage>>, TransportError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct Queues {
    outbound: VecDeque<Routed<HostMessage>>,
    inbound: VecDeque<Routed<PlayerMessage>>,
    disconnected: bool,
}

/// In-process transport backed by shared queues.
///
/// Clones share the same queues, so one clone can be given to a manager
/// while another plays the remote side.
#[derive(Debug, Clone, Default)]
pub struct QueueTransport {
    queues: Rc<RefCell<Queues>>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every command sent so far
    pub fn take_sent(&self) -> Vec<Routed<HostMessage>> {
        self.queues.borrow_mut().outbound.drain(..).collect()
    }

    /// Queue a notification for the next poll
    pub fn deliver(&self, message: Routed<PlayerMessage>) {
        self.queues.borrow_mut().inbound.push_back(message);
    }

    /// Simulate the peer going away (sends fail) or coming back
    pub fn set_connected(&self, connected: bool) {
        self.queues.borrow_mut().disconnected = !connected;
    }
}

impl MediaTransport for QueueTransport {
    fn send(&mut self, message: Routed<HostMessage>) -> Result<(), TransportError> {
        let mut queues = self.queues.borrow_mut();
        if queues.disconnected {
            return Err(TransportError::Disconnected);
        }
        queues.outbound.push_back(message);
        Ok(())
    }

    fn poll_incoming(&mut self) -> Result<Vec<Routed<PlayerMessage>>, TransportError> {
        Ok(self.queues.borrow_mut().inbound.drain(..).collect())
    }
}

/// Transport over an [`IpcChannel`], one checksummed frame per message
#[derive(Debug)]
pub struct ChannelTransport {
    channel: IpcChannel,
    decoder: FrameDecoder,
    read_buffer: Vec<u8>,
}

impl ChannelTransport {
    pub fn new(channel: IpcChannel) -> Self {
        Self {
            channel,
            decoder: FrameDecoder::new(),
            read_buffer: Vec::with_capacity(4096),
        }
    }

    /// Connect to the remote player's socket
    pub fn connect(path: &str) -> Result<Self, TransportError> {
        let mut channel = IpcChannel::new(path);
        channel.connect()?;
        Ok(Self::new(channel))
    }

    pub fn channel(&self) -> &IpcChannel {
        &self.channel
    }
}

impl MediaTransport for ChannelTransport {
    fn send(&mut self, message: Routed<HostMessage>) -> Result<(), TransportError> {
        if !self.channel.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let frame = MessageFrame::encode(&message);
        self.channel.send(&frame.to_bytes())?;
        Ok(())
    }

    fn poll_incoming(&mut self) -> Result<Vec<Routed<PlayerMessage>>, TransportError> {
        if !self.channel.is_connected() {
            return Err(TransportError::Disconnected);
        }

        // Commands the socket could not take earlier go out first.
        let unsent = self.channel.flush()?;
        if unsent > 0 {
            tracing::debug!("{} bytes still waiting for the socket", unsent);
        }

        self.read_buffer.clear();
        self.channel.read_available(&mut self.read_buffer)?;
        self.decoder.push(&self.read_buffer);

        let mut messages = Vec::new();
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => match frame.decode::<Routed<PlayerMessage>>() {
                    Ok(message) => messages.push(message),
                    Err(e) => tracing::warn!("Dropping undecodable player message: {}", e),
                },
                Ok(None) => break,
                Err(e) => tracing::warn!("Dropping corrupt frame: {}", e),
            }
        }
        Ok(messages)
    }
}
