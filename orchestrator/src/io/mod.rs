//! I/O helpers: tool transport, configuration and files.

pub mod config;
pub mod http_client;
pub mod instance;
pub mod patch;
pub mod tool_client;
