//! Request correlation
//!
//! Every HTTP request gets a short trace id carried in a tracing span and
//! in request extensions, so handler and middleware logs line up.

mod trace_context;

pub use trace_context::{generate_trace_id, TraceContext};
