//! Legacy backend adapters
//!
//! [`HttpBackendClient`] speaks the backend's JSON start/status API.
//! Launchers send the user to the backend page out-of-band.

mod http;
mod launcher;

pub use self::http::HttpBackendClient;
pub use launcher::{BrowserLauncher, LogLauncher};
