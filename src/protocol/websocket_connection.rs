/// WebSocket connection implementation for TerminalConnection trait
use std::fmt::Debug;
use tracing::{debug, error};

use axum::extract::ws::Message::{Binary, Close, Ping, Pong, Text};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::protocol::{
    ConnectionError, ConnectionResult, ConnectionType, FrameSink, FrameSource, TerminalConnection,
    TerminalMessage,
};

/// WebSocket connection implementation that implements TerminalConnection trait
pub struct WebSocketConnection {
    socket: WebSocket,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection").finish_non_exhaustive()
    }
}

impl TerminalConnection for WebSocketConnection {
    type Sink = WebSocketSink;
    type Source = WebSocketSource;

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::WebSocket
    }

    fn split(self) -> (Self::Sink, Self::Source) {
        let (sink, stream) = self.socket.split();
        (WebSocketSink { sink }, WebSocketSource { stream })
    }
}

pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> ConnectionResult<()> {
        self.sink
            .send(Text(text))
            .await
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        let sent = self.sink.send(Close(None)).await;
        // Flush and shut the sink down even if the close frame could not be sent.
        let closed = self.sink.close().await;
        sent.and(closed)
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }
}

pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl FrameSource for WebSocketSource {
    async fn receive(&mut self) -> Option<ConnectionResult<TerminalMessage>> {
        loop {
            return match self.stream.next().await {
                Some(Ok(Text(text))) => {
                    debug!("WebSocket received text message, length: {}", text.len());
                    Some(Ok(TerminalMessage::Text(text)))
                }
                Some(Ok(Binary(bin))) => {
                    debug!("WebSocket received binary message, length: {}", bin.len());
                    Some(Ok(TerminalMessage::Binary(bin)))
                }
                // axum answers pings itself
                Some(Ok(Ping(_) | Pong(_))) => continue,
                Some(Ok(Close(_))) => {
                    debug!("WebSocket received close message");
                    Some(Ok(TerminalMessage::Close))
                }
                Some(Err(e)) => {
                    error!("WebSocket receive error: {}", e);
                    Some(Err(ConnectionError::WebSocket(e.to_string())))
                }
                None => {
                    debug!("WebSocket connection closed");
                    None
                }
            };
        }
    }
}
