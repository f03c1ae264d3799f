/// HTTP and websocket handlers for the web shell
pub mod files;
pub mod rest;
pub mod websocket;
