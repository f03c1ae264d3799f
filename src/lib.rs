//! Browser-reachable terminal sessions: a websocket bridged to a shell on a pty.

pub mod api;
pub mod app_state;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod pty;
pub mod server;
pub mod service;

pub use app_state::AppState;
