//! Middleware layer.
//!
//! Cross-cutting concerns that wrap every dispatched request. For now that is
//! a single one:
//!
//! - [`trace`]: one log line per request with method, path, status, latency

use std::future::Future;
use std::time::Instant;

use tracing::{info, warn};

use crate::response::Response;

/// Runs `fut` and logs the outcome. Server errors are logged at `warn`.
pub(crate) async fn trace<F>(method: &str, path: &str, fut: F) -> Response
where
    F: Future<Output = Response>,
{
    let started = Instant::now();
    let res = fut.await;
    let status = res.status_code().code();
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    if status >= 500 {
        warn!(%method, %path, status, latency_ms, "request failed");
    } else {
        info!(%method, %path, status, latency_ms, "request");
    }
    res
}
