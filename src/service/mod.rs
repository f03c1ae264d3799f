/// Service layer for terminal session management
mod error;
mod message_handler;
mod pty_manager;
mod session_handler;
mod session_manager;

// Re-export public types and functions
pub use error::SessionError;
pub use message_handler::{
    InputAction, MessageHandler, OutputDecoder, expand_carriage_returns, split_frames,
};
pub use pty_manager::PtyManager;
pub use session_handler::{SessionSettings, TeardownReport, TerminalSession};
pub use session_manager::SessionManager;
