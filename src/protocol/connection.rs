/// Terminal connection traits for abstracting different transport protocols
use std::fmt::Debug;

use serde::Serialize;
use thiserror::Error;

/// 连接错误类型
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// WebSocket 错误
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,
}

/// 连接结果类型
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A client-facing duplex connection carrying text frames.
///
/// A session splits the connection once, so the output writer and the input
/// loop each own one half and never contend for the same lock.
pub trait TerminalConnection: Send + 'static {
    type Sink: FrameSink;
    type Source: FrameSource;

    /// Get the connection type
    fn connection_type(&self) -> ConnectionType;

    /// Split into the outbound and inbound halves.
    fn split(self) -> (Self::Sink, Self::Source);
}

/// Outbound half: server to client.
#[async_trait::async_trait]
pub trait FrameSink: Send + 'static {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> ConnectionResult<()>;

    /// Close the connection. Implementations may fail if it is already closed.
    async fn close(&mut self) -> ConnectionResult<()>;
}

/// Inbound half: client to server.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Receive the next frame.
    /// Returns None when the connection is closed
    async fn receive(&mut self) -> Option<ConnectionResult<TerminalMessage>>;
}

/// Terminal message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMessage {
    /// Keystrokes as text
    Text(String),
    /// Keystrokes as raw bytes
    Binary(Vec<u8>),
    /// Client asked to close
    Close,
}

/// Connection types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionType {
    /// WebSocket connection
    WebSocket,
    /// In-process channel connection
    Channel,
}
