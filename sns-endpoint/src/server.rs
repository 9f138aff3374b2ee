//! HTTP listener for SNS deliveries.

use std::borrow::Cow;
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::service::{make_service_fn, service_fn, Service};
use percent_encoding::percent_decode_str;
use tokio::sync::mpsc;
use warp::http::HeaderMap;
use warp::Filter;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::router::{DeliveryHandler, Outcome, TopicRouter};

/// HTTP server for SNS topic endpoints.
///
/// Topics are added before the server starts. Starting consumes the server,
/// so the routing table cannot change while requests are being served.
///
/// # Example
///
/// ```no_run
/// use sns_endpoint::{Delivery, NotificationServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), sns_endpoint::ServerError> {
///     let mut server = NotificationServer::new();
///     server.add_topic(
///         "arn:aws:sns:us-east-1:123456789012:orders",
///         "/sns/orders",
///         |delivery: Delivery| println!("{delivery:?}"),
///     );
///
///     server.listen_and_serve(":8080").await
/// }
/// ```
#[derive(Debug, Default)]
pub struct NotificationServer {
    /// Routing table handed to the listener on start
    router: TopicRouter,
    /// Listener limits
    config: ServerConfig,
}

impl NotificationServer {
    /// Create a server with default limits that confirms subscriptions over HTTP.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_router(TopicRouter::new(), config)
    }

    /// Serve an already populated router.
    pub fn with_router(router: TopicRouter, config: ServerConfig) -> Self {
        Self { router, config }
    }

    /// Register `handler` for deliveries from `topic_arn` on `path`.
    ///
    /// See [`TopicRouter::add_topic`].
    pub fn add_topic(
        &mut self,
        topic_arn: impl Into<String>,
        path: impl Into<String>,
        handler: impl DeliveryHandler,
    ) {
        self.router.add_topic(topic_arn, path, handler);
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Listen on `address` and serve until the listener fails.
    ///
    /// `address` is `host:port`; a bare `:port` listens on all interfaces.
    pub async fn listen_and_serve(self, address: &str) -> Result<()> {
        let addr = resolve_address(address).await?;
        let (local_addr, server) = self.bind(addr, std::future::pending())?;

        tracing::info!(addr = %local_addr, "Listening");
        server.await.map_err(ServerError::Serve)
    }

    /// Start listening on a background task.
    ///
    /// Returns once the socket is bound. Useful with port `0`, where the
    /// returned handle reports the port the OS picked.
    pub async fn start(self, address: &str) -> Result<RunningServer> {
        let addr = resolve_address(address).await?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (local_addr, server) = self.bind(addr, async move {
            shutdown_rx.recv().await;
        })?;

        tracing::info!(addr = %local_addr, "Listening");
        let server_handle =
            tokio::spawn(async move { server.await.map_err(ServerError::Serve) });

        Ok(RunningServer {
            local_addr,
            base_url: base_url(local_addr),
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Bind the socket and build the serving future.
    fn bind(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(
        SocketAddr,
        impl Future<Output = std::result::Result<(), hyper::Error>> + Send + 'static,
    )> {
        self.config.validate()?;

        let write_timeout = self.config.write_timeout;
        let service = warp::service(routes(Arc::new(self.router)));

        let make_service = make_service_fn(move |_conn| {
            let service = service.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request: hyper::Request<hyper::Body>| {
                    let mut service = service.clone();
                    async move { with_deadline(write_timeout, service.call(request)).await }
                }))
            }
        });

        let server = hyper::Server::try_bind(&addr)
            .map_err(|source| ServerError::Bind { addr, source })?
            .http1_header_read_timeout(self.config.read_timeout)
            .http1_max_buf_size(self.config.max_header_bytes)
            .serve(make_service);

        let local_addr = server.local_addr();
        Ok((local_addr, server.with_graceful_shutdown(shutdown)))
    }
}

/// Handle to a server started with [`NotificationServer::start`].
#[derive(Debug)]
pub struct RunningServer {
    /// The address the listener is bound to
    local_addr: SocketAddr,
    /// Base URL for building endpoint URLs
    base_url: String,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<Result<()>>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// `http://<ip>:<port>`, using loopback when bound to every interface.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop accepting connections, let in-flight requests finish, and wait
    /// for the listener task.
    ///
    /// Handler tasks spawned for earlier deliveries are not waited for.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match self.server_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| ServerError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }
}

/// Resolve `host:port`, treating a bare `:port` as every IPv4 interface.
pub(crate) async fn resolve_address(address: &str) -> Result<SocketAddr> {
    let invalid = |reason: String| ServerError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let target = match address.strip_prefix(':') {
        Some(port) => format!("{}:{port}", Ipv4Addr::UNSPECIFIED),
        None => address.to_string(),
    };

    let mut addrs = tokio::net::lookup_host(target)
        .await
        .map_err(|e| invalid(e.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| invalid("no addresses resolved".to_string()))
}

fn base_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

/// Bound a request's handling. An elapsed request errors out of the
/// service, which makes hyper close the connection without a response.
async fn with_deadline<F>(
    limit: Duration,
    response: F,
) -> std::result::Result<warp::reply::Response, tokio::time::error::Elapsed>
where
    F: Future<Output = std::result::Result<warp::reply::Response, Infallible>>,
{
    match tokio::time::timeout(limit, response).await? {
        Ok(response) => Ok(response),
        Err(never) => match never {},
    }
}

/// Every method and path goes through the router.
fn routes(
    router: Arc<TopicRouter>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone + Send + Sync + 'static
{
    warp::path::full()
        .and(warp::header::headers_cloned())
        .and(body_or_empty())
        .and_then(
            move |path: warp::path::FullPath, headers: HeaderMap, body: Bytes| {
                let router = router.clone();
                async move {
                    let path = decode_path(path.as_str());
                    let outcome = router.dispatch(&path, &headers, &body).await;
                    Ok::<_, Infallible>(reply(outcome))
                }
            },
        )
}

/// The request body, or an empty one if it could not be read.
///
/// An empty body fails extraction, so the router still decides the status.
fn body_or_empty() -> impl Filter<Extract = (Bytes,), Error = Infallible> + Clone {
    warp::body::bytes()
        .or(warp::any().map(|| {
            tracing::debug!("Request body could not be read");
            Bytes::new()
        }))
        .unify()
}

/// Percent-decode a request path. Invalid UTF-8 is replaced.
fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8_lossy()
}

fn reply(outcome: Outcome) -> warp::reply::Response {
    use warp::Reply;

    warp::reply::with_status(format!("{}\n", outcome.body()), outcome.status()).into_response()
}
