/// Application state management for the web shell
mod app_state;
mod file_store;
mod registry;
mod session;

pub use app_state::AppState;
pub use file_store::{FileStore, FileStoreError};
pub use registry::SessionRegistry;
pub use session::{
    CloseReason, CloseTrigger, SessionHandle, SessionId, SessionSnapshot, SessionState, StateCell,
};
