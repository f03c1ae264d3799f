/// Server management for the web shell
mod server;

pub use server::{
    bind, build_router, run_server, run_server_with_graceful_shutdown, shutdown_signal,
};
