//! Tracing setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing: default info, overridable via RUST_LOG
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();
}

/// Short stable digest of user text for log lines (raw queries are never logged)
pub fn query_digest(text: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in text.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}/{}", hash, text.chars().count())
}
