//! HTTP trigger handler.
//!
//! `HttpTrigger` runs a hyper HTTP/1.1 server. Every request body is read
//! in full, up to a size limit, and handed to an [`InvocationHandler`]; the returned status and
//! text are written back as a `text/plain` response.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Status and body produced for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Largest request body accepted by default. Alarm events are a few KiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Callback invoked with the raw request body.
pub type InvocationHandler = Arc<dyn Fn(Bytes) -> BoxFuture + Send + Sync>;

pub type BoxFuture = Pin<Box<dyn Future<Output = Reply> + Send>>;

/// HTTP trigger server.
pub struct HttpTrigger {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: InvocationHandler,
    body_limit: usize,
}

impl HttpTrigger {
    /// Bind the listener. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr, handler: InvocationHandler) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP trigger on {addr}"))?;
        let local_addr = listener.local_addr().context("reading bound address")?;
        Ok(Self {
            listener,
            local_addr,
            handler,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Refuse request bodies larger than `bytes`.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` changes.
    ///
    /// Each connection runs on its own task, so invocations proceed
    /// concurrently.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(addr = %self.local_addr, "HTTP trigger listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = accepted.context("accept failed")?;
                    let handler = self.handler.clone();
                    let body_limit = self.body_limit;

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            async move { Ok::<_, hyper::Error>(invoke(handler, req, body_limit, peer_addr).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("HTTP trigger shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn invoke(
    handler: InvocationHandler,
    req: Request<Incoming>,
    body_limit: usize,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    debug!(%peer_addr, method = %req.method(), path = req.uri().path(), "invocation received");

    let reply = match Limited::new(req.into_body(), body_limit).collect().await {
        Ok(collected) => handler(collected.to_bytes()).await,
        Err(e) if e.is::<LengthLimitError>() => {
            debug!(%peer_addr, body_limit, "request body too large");
            Reply::new(500, format!("request body exceeds {body_limit} bytes"))
        }
        Err(e) => {
            debug!(%peer_addr, error = %e, "reading request body failed");
            Reply::new(500, format!("reading request body: {e}"))
        }
    };

    text_response(reply)
}

fn text_response(reply: Reply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
