//! Process wide observability: tracing setup, a panic hook that routes
//! panics through the log stack and the prometheus registry with its
//! metrics/health server.

pub mod metrics;
pub mod panic_hook;
pub mod tracing;
