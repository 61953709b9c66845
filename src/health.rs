//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? |
//! | **Readiness** | `/readyz` | Can it serve traffic, i.e. does the database answer? |

use std::sync::Arc;

use tracing::warn;

use crate::app::App;
use crate::{Request, Response, Status};

/// Always `200 OK` with body `"ok"`. No dependencies on purpose.
pub async fn liveness(_app: Arc<App>, _req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with `"ready"` while the database answers, `503` otherwise.
pub async fn readiness(app: Arc<App>, _req: Request) -> Response {
    match app.store.ping() {
        Ok(()) => Response::text("ready"),
        Err(e) => {
            warn!("readiness check failed: {e}");
            Response::status(Status::ServiceUnavailable)
        }
    }
}
