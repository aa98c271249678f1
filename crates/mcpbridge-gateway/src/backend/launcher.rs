use mcpbridge_core::UserAgentLauncher;
use tracing::{info, warn};

/// Opens the backend page in the desktop browser
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserLauncher;

impl UserAgentLauncher for BrowserLauncher {
    fn launch(&self, url: &str) -> Result<(), String> {
        info!("[Launcher] Opening browser for backend authorization");
        open::that_detached(url).map_err(|e| {
            warn!("[Launcher] Failed to open browser: {}", e);
            e.to_string()
        })
    }
}

/// Headless mode: prints the URL for the operator to open
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLauncher;

impl UserAgentLauncher for LogLauncher {
    fn launch(&self, url: &str) -> Result<(), String> {
        info!("[Launcher] Open this URL to authorize: {}", url);
        Ok(())
    }
}
