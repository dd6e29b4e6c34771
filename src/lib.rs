// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod diagnose;
pub mod dispatch;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod synthesize;

pub(crate) mod payload;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::dispatch::{HttpTransport, RawResult, ToolTransport};
pub use crate::registry::{Registry, SourceDescriptor};
pub use crate::router::{route, QueryContext, RoutingResult, ToolCall};
pub use crate::synthesize::{synthesize, Synthesis};

/// Short anonymized id for a query: queries are never logged raw, only a
/// 6-byte SHA-256 prefix.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
