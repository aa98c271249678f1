use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use tracing::{info, info_span, Span};

static NEXT_REQUEST: AtomicU32 = AtomicU32::new(0);

/// Six hex digits, unique within the last 16M requests of this process
pub fn generate_trace_id() -> String {
    let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
    // Odd multiplier permutes the 24-bit space so neighbours look unrelated
    format!("{:06x}", n.wrapping_mul(0x9E_3779) & 0xFF_FFFF)
}

/// Correlation data for one HTTP request, stored in request extensions
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Parent span for everything logged while handling the request
    pub fn span(&self) -> Span {
        info_span!("request", trace_id = %self.trace_id, method = %self.method, path = %self.path)
    }

    pub fn log_received(&self) {
        info!(trace_id = %self.trace_id, "→ {} {}", self.method, self.path);
    }

    pub fn log_completed(&self, status: u16) {
        info!(trace_id = %self.trace_id, "← {} ({}ms)", status, self.elapsed_ms());
    }
}
