//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and feeds each HTTP/1.1 request to a [`Dispatcher`].
//! Connections are persistent unless either side asks for `Connection: close`.

use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::body;
use crate::dispatch::{Dispatcher, Outcome};
use crate::exception::HttpException;
use crate::http::StatusCode;
use crate::http::request::{Request, RequestError};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request head (request line plus headers) buffered before answering `431`.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The TCP front end.
///
/// # Examples
///
/// ```rust,no_run
/// use nanoroute::config::AppConfig;
/// use nanoroute::dispatch::Dispatcher;
/// use nanoroute::router::Router;
/// use nanoroute::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = AppConfig::default();
///     let server = Server::bind(&config.address).await?;
///     server.run(Dispatcher::new(Router::new(), config)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the listener fails, one task per connection.
    pub async fn run(self, dispatcher: Dispatcher) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "nanoroute listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let dispatcher = dispatcher.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, dispatcher).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Writes `exception` as the final response on the connection.
async fn reject(stream: &mut TcpStream, exception: HttpException) -> std::io::Result<()> {
    let response = exception.into_response(false);
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}

/// Serves requests on one connection until the peer or a response closes it.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Dispatcher,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Read until a full request head is buffered.
        let (request, head_len) = loop {
            match Request::parse(&buf) {
                Ok(parsed) => break parsed,
                Err(RequestError::Incomplete) => {}
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "malformed request, sending 400");
                    let exception = HttpException::bad_request(format!("Bad Request: {e}"));
                    return reject(&mut stream, exception).await;
                }
            }

            if buf.len() > MAX_HEAD_SIZE {
                warn!(peer = %peer_addr, "request head too large, sending 431");
                let exception = HttpException::new(
                    "Request header fields too large",
                    StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                );
                return reject(&mut stream, exception).await;
            }

            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                return Ok(());
            }
        };

        if request.is_chunked() {
            warn!(peer = %peer_addr, "chunked request body, sending 501");
            let exception =
                HttpException::not_implemented("Chunked request bodies are not supported");
            return reject(&mut stream, exception).await;
        }

        let content_length = match request.content_length() {
            Ok(declared) => declared.unwrap_or(0),
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "unframeable request body, sending 400");
                let exception = HttpException::bad_request(format!("Bad Request: {e}"));
                return reject(&mut stream, exception).await;
            }
        };
        let limit = dispatcher.config().max_body_bytes;
        if body::check_declared_length(content_length, limit).is_err() {
            warn!(peer = %peer_addr, content_length, "declared body too large, sending 413");
            let exception = HttpException::payload_too_large("Request entity too large");
            return reject(&mut stream, exception).await;
        }

        buf.advance(head_len);
        let buffered = buf.split_to(content_length.min(buf.len())).freeze();
        let remaining = (content_length - buffered.len()) as u64;
        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let reader = AsyncReadExt::chain(&buffered[..], (&mut stream).take(remaining));
        let outcome = dispatcher.dispatch(request, reader).await;

        let response = match outcome {
            Outcome::Responded(response) => response,
            Outcome::Unanswered(_) => {
                debug!(peer = %peer_addr, "request left unanswered, closing connection");
                break;
            }
        };

        let close = !keep_alive || !response.keep_alive();
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        if close {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}
