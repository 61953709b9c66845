//! HTTP server and graceful shutdown.
//!
//! The accept loop hands each connection to its own task. A shutdown signal
//! (SIGTERM, or Ctrl-C) closes the listener at once; open connections are
//! then allowed to finish before [`Server::serve`] returns.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;

/// Listening address plus the serve loop.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr`; nothing is bound until [`serve`](Server::serve).
    ///
    /// ```rust,no_run
    /// use yatube::Server;
    /// let server = Server::bind("127.0.0.1:8000")?;
    /// # Ok::<(), yatube::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|source| Error::Address {
            addr: addr.to_owned(),
            source,
        })?;
        Ok(Self { addr })
    }

    /// Serves `router` until a shutdown signal arrives and every open
    /// connection has closed.
    pub async fn serve<S>(self, router: Router<S>) -> Result<(), Error>
    where
        S: Clone + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);
        let mut connections = JoinSet::new();
        info!(addr = %self.addr, "yatube listening");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(open = connections.len(), "shutting down, waiting for open connections");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(Arc::clone(&router), stream, peer));
                    }
                    Err(e) => error!("accept failed: {e}"),
                },

                // Finished connections are reaped as we go.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        while connections.join_next().await.is_some() {}
        info!("yatube stopped");
        Ok(())
    }
}

/// Drives one TCP connection, HTTP/1.1 or HTTP/2, until the peer hangs up.
async fn serve_connection<S>(router: Arc<Router<S>>, stream: TcpStream, peer: SocketAddr)
where
    S: Clone + Send + Sync + 'static,
{
    debug!(%peer, "connection opened");
    let svc = service_fn(move |req| dispatch(Arc::clone(&router), req, peer));
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .await
    {
        warn!(%peer, "connection closed with error: {e}");
    }
}

/// Buffers the body, routes the request and converts the answer for hyper.
/// An unreadable body is a `400`; nothing here fails.
async fn dispatch<S>(
    router: Arc<Router<S>>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    S: Clone + Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let response = match body.collect().await {
        Ok(collected) => {
            let req = http::Request::from_parts(parts, collected.to_bytes());
            router.handle(req).await
        }
        Err(e) => {
            warn!(%peer, "request body unreadable: {e}");
            Response::status(Status::BadRequest)
        }
    };
    Ok(response.into_inner())
}

/// Completes on SIGTERM or Ctrl-C, whichever comes first.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("interrupt received"),
        () = terminate => info!("SIGTERM received"),
    }
}
