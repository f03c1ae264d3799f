/// PTY (Pseudo Terminal) handling for the web shell.
/// One pty pair plus one shell process per session, driven by tokio's reactor
/// through a non-blocking master descriptor.
mod pty_types;
#[cfg(unix)]
mod unix_pty_impl;

pub use pty_types::*;
#[cfg(unix)]
pub use unix_pty_impl::{PtyMaster, ShellProcess, spawn_pty};
