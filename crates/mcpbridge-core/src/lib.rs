//! # McpBridge Core Library
//!
//! Domain vocabulary for the OAuth adapter that fronts a legacy, poll-based
//! credential service.
//!
//! ## Modules
//!
//! - `domain` - Authorization sessions, CSRF tokens, issued bearer tokens, clients
//! - `repository` - Store traits (CSRF, session, token, client registry)
//! - `backend` - Contract of the legacy backend and the user-agent launcher
//! - `config` - Bridge configuration with env loading
//! - `error` - Typed domain errors

pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;

// Re-export commonly used types
pub use backend::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use repository::*;
