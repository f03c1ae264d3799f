/// REST API types for the web shell
pub mod dto;
mod error;

pub use error::ApiError;
