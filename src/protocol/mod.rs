/// Protocol abstraction for the web shell
mod channel_connection;
mod connection;
mod websocket_connection;

pub use channel_connection::{
    ChannelClient, ChannelConnection, ChannelSink, ChannelSource, channel_pair,
};
pub use connection::{
    ConnectionError, ConnectionResult, ConnectionType, FrameSink, FrameSource, TerminalConnection,
    TerminalMessage,
};
pub use websocket_connection::{WebSocketConnection, WebSocketSink, WebSocketSource};
