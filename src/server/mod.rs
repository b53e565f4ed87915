//! HTTP servers.
//!
//! Both servers share one accept loop over hyper's HTTP/1 connection
//! builder; each connection runs on its own task.

pub mod api;
pub mod edge;

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::error::{Result, ShowroomError};

pub use api::ApiServer;
pub use edge::EdgeServer;

/// Response body type for both servers.
pub type Body = Full<Bytes>;

/// Largest request body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Turns one request into one response. Never fails: errors become statuses.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request<Incoming>) -> impl Future<Output = Response<Body>> + Send;
}

/// Accept connections until `shutdown` resolves.
///
/// # Errors
/// Returns an error only if the listener address cannot be read.
pub async fn serve<H, S>(listener: TcpListener, handler: Arc<H>, shutdown: S) -> Result<()>
where
    H: Handler,
    S: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Listening");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                };

                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let service = service_fn(move |request| {
                        let handler = Arc::clone(&handler);
                        async move { Ok::<_, Infallible>(handler.handle(request).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(%peer, error = %e, "Connection closed with error");
                    }
                });
            }
            () = &mut shutdown => {
                tracing::info!(%addr, "Shutting down");
                return Ok(());
            }
        }
    }
}

/// Read a request body up to [`MAX_BODY_BYTES`].
///
/// # Errors
/// Returns [`ShowroomError::InvalidRequest`] if the body is too large or the
/// connection fails mid-body.
pub async fn read_body(body: Incoming) -> Result<Vec<u8>> {
    let collected = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| ShowroomError::InvalidRequest(format!("request body: {e}")))?;
    Ok(collected.to_bytes().to_vec())
}

/// JSON response with a status.
#[must_use]
pub fn json_response<T: Serialize + ?Sized>(status: u16, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => with_status(status, "application/json", body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            with_status(500, "text/plain; charset=utf-8", b"internal error".to_vec())
        }
    }
}

/// Response with a status, content type and body.
#[must_use]
pub fn with_status(status: u16, content_type: &str, body: Vec<u8>) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if let Ok(value) = header::HeaderValue::from_str(content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// Wait for Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
