/// In-process connection backed by tokio channels.
/// Lets a session run without a network listener; the peer drives it through
/// [`ChannelClient`].
use tokio::sync::mpsc;

use crate::protocol::{
    ConnectionError, ConnectionResult, ConnectionType, FrameSink, FrameSource, TerminalConnection,
    TerminalMessage,
};

/// Create a connected pair. `capacity` bounds each direction.
pub fn channel_pair(capacity: usize) -> (ChannelConnection, ChannelClient) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let connection = ChannelConnection {
        inbound: inbound_rx,
        outbound: outbound_tx,
    };
    let client = ChannelClient {
        input: Some(inbound_tx),
        output: outbound_rx,
    };
    (connection, client)
}

#[derive(Debug)]
pub struct ChannelConnection {
    inbound: mpsc::Receiver<TerminalMessage>,
    outbound: mpsc::Sender<String>,
}

impl TerminalConnection for ChannelConnection {
    type Sink = ChannelSink;
    type Source = ChannelSource;

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Channel
    }

    fn split(self) -> (Self::Sink, Self::Source) {
        (
            ChannelSink {
                outbound: Some(self.outbound),
            },
            ChannelSource {
                inbound: self.inbound,
            },
        )
    }
}

#[derive(Debug)]
pub struct ChannelSink {
    outbound: Option<mpsc::Sender<String>>,
}

#[async_trait::async_trait]
impl FrameSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> ConnectionResult<()> {
        let outbound = self.outbound.as_ref().ok_or(ConnectionError::ConnectionClosed)?;
        outbound
            .send(text)
            .await
            .map_err(|_| ConnectionError::ConnectionClosed)
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        match self.outbound.take() {
            Some(_) => Ok(()),
            None => Err(ConnectionError::ConnectionClosed),
        }
    }
}

#[derive(Debug)]
pub struct ChannelSource {
    inbound: mpsc::Receiver<TerminalMessage>,
}

#[async_trait::async_trait]
impl FrameSource for ChannelSource {
    async fn receive(&mut self) -> Option<ConnectionResult<TerminalMessage>> {
        self.inbound.recv().await.map(Ok)
    }
}

/// The client end of a [`channel_pair`].
#[derive(Debug)]
pub struct ChannelClient {
    input: Option<mpsc::Sender<TerminalMessage>>,
    output: mpsc::Receiver<String>,
}

impl ChannelClient {
    /// Send a keystroke frame. Fails once the session stopped reading or the
    /// client disconnected.
    pub async fn send_text(&self, text: impl Into<String>) -> ConnectionResult<()> {
        let input = self.input.as_ref().ok_or(ConnectionError::ConnectionClosed)?;
        input
            .send(TerminalMessage::Text(text.into()))
            .await
            .map_err(|_| ConnectionError::ConnectionClosed)
    }

    /// Next output frame, or None once the server closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        self.output.recv().await
    }

    /// Drop the input side, which the session observes as a client disconnect.
    pub fn disconnect(&mut self) {
        self.input = None;
    }
}
