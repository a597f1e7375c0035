//! Host transport on hyper.
//!
//! The routing core never blocks on I/O and never awaits. This adapter is the
//! only async code in the crate: it accepts TCP connections, collects each
//! request body, and hands the finished [`Request`] to
//! [`Router::dispatch`] on tokio's blocking pool, so a slow handler occupies
//! a blocking thread rather than a reactor worker.
//!
//! Shutdown is graceful. Once the shutdown future resolves the listener is
//! dropped, connections already accepted are served to completion, and only
//! then does `serve` return. [`Server::serve`] waits for SIGTERM or Ctrl-C,
//! which is what container orchestrators send before killing a process.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Interrupted};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Serves a [`Router`] over HTTP/1 and HTTP/2.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr`; nothing is bound until [`serve`](Server::serve).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] if `addr` is not a valid `host:port` string.
    ///
    /// ```rust
    /// use waypost::Server;
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains open
    /// connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `shutdown` resolves, then drains open
    /// connections.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the address cannot be bound.
    pub async fn serve_with_shutdown<F>(self, router: Router, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, routes = router.routes().len(), "waypost listening");
        accept_loop(listener, Arc::new(router), shutdown).await;
        info!("waypost stopped");
        Ok(())
    }
}

/// Accepts until `shutdown` resolves, then waits for every connection task.
async fn accept_loop<F>(listener: TcpListener, router: Arc<Router>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown is polled first so no connection is accepted after it.
            biased;

            () = &mut shutdown => {
                info!(open = connections.len(), "shutting down, draining connections");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, Arc::clone(&router)));
                }
                Err(e) => error!("accept failed: {e}"),
            },

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Arc<Router>) {
    debug!(%peer, "connection accepted");
    let service = service_fn(move |req| handle(Arc::clone(&router), req));

    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        // Also reached for interrupted requests, which abort the connection.
        warn!(%peer, "connection closed with error: {e}");
    }
}

/// Converts one hyper request, dispatches it, converts the response back.
///
/// An [`Interrupted`] dispatch becomes a service error, which makes hyper
/// drop the connection without a response.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Interrupted> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };
    let req = Request::from(http::Request::from_parts(parts, body));

    match tokio::task::spawn_blocking(move || router.dispatch(req)).await {
        Ok(dispatched) => dispatched.map(Response::into_inner),
        Err(e) => {
            error!("dispatch task failed: {e}");
            Ok(Response::status(StatusCode::INTERNAL_SERVER_ERROR).into_inner())
        }
    }
}

/// Resolves on SIGTERM (Unix only) or Ctrl-C, whichever comes first.
///
/// A handler that cannot be installed is logged and simply never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
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
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::request::Call;
    use crate::table::RouteTable;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn serves_requests_and_drains_on_shutdown() {
        let mut routes = RouteTable::builder();
        routes
            .post("/echo/{name}", |call: &mut Call| {
                format!("{} {}", call.param("name").unwrap_or("-"), String::from_utf8_lossy(call.request().body()))
            })
            .unwrap();
        let router = Router::new(routes.seal().unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(accept_loop(listener, Arc::new(router), async move {
            let _ = stopped.await;
        }));

        let ok = roundtrip(
            addr,
            "POST /echo/ada HTTP/1.1\r\nhost: test\r\ncontent-length: 5\r\nconnection: close\r\n\r\nhello",
        )
        .await;
        assert!(ok.starts_with("HTTP/1.1 200 OK"), "{ok}");
        assert!(ok.ends_with("ada hello"), "{ok}");

        let missing = roundtrip(addr, "GET /nowhere HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

        stop.send(()).unwrap();
        server.await.unwrap();
    }
}
