//! TSTO Server Library
//!
//! Core building blocks for the TSTO private server: payload compression and
//! archiving, a minimal HTTP/1.1 message layer, and periodic town backups.
//!
//! ## Modules
//!
//! - `backup` - Town file backups and the background backup scheduler
//! - `compression` - zlib/gzip codecs and zip archives
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `http` - HTTP request parsing and response building
//! - `net` - Admin listener serving status and backup endpoints
//! - `state` - Shared application state

pub mod backup;
pub mod compression;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
