//! Connection handler module
//!
//! Owns the socket side of the admin listener: reads one request, frames its
//! body, dispatches it to [`routes`](super::routes) and writes the response
//! before closing the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::compression;
use crate::error::{CodecError, HttpError, NetworkError, Result, ServerError};
use crate::http::{find_head_end, header, HttpRequest, HttpResponse};
use crate::net::routes;
use crate::AppState;

/// Largest accepted request head
const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Largest accepted request body, after chunk and gzip decoding
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 30;

/// Handles a single admin connection
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Serve one request on `stream` and close it
    pub async fn handle<S>(&self, mut stream: S, addr: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = tokio::time::timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            read_request(&mut stream),
        )
        .await;

        let response = match read {
            Err(_) => return Err(NetworkError::Timeout.into()),
            Ok(Ok(request)) => {
                debug!(
                    address = %addr,
                    method = %request.method,
                    path = request.path(),
                    "Admin request"
                );
                routes::route(&self.state, &request).await
            }
            Ok(Err(ServerError::Network(NetworkError::RequestTooLarge(size)))) => {
                warn!(address = %addr, size, "Request too large");
                HttpResponse::error(413, "Payload Too Large", "Request too large")
            }
            Ok(Err(e @ (ServerError::Http(_) | ServerError::Codec(_)))) => {
                warn!(address = %addr, error = %e, "Malformed request");
                HttpResponse::error(400, "Bad Request", &e.to_string())
            }
            Ok(Err(e)) => return Err(e),
        };

        let response = self.finalize(response);
        stream.write_all(&response.build()).await?;
        stream.flush().await?;
        stream.shutdown().await?;

        debug!(address = %addr, status = response.status_code, "Response sent");
        Ok(())
    }

    /// Add the headers every admin response carries
    fn finalize(&self, response: HttpResponse) -> HttpResponse {
        let length = response.body.len();
        response
            .with_header("Server", self.state.config.server_name.as_str())
            .with_header("Date", header::http_date())
            .with_header("Content-Length", length.to_string())
            .with_header("Connection", "close")
    }
}

/// Read one request: head, then a body framed by chunked encoding or
/// `Content-Length`, gzip-decoded when `Content-Encoding: gzip` is set.
pub async fn read_request<S>(stream: &mut S) -> Result<HttpRequest>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);
    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Err(NetworkError::RequestTooLarge(buf.len()).into());
        }
        read_more(stream, &mut buf).await?;
    };

    let mut request = HttpRequest::parse(&buf[..head_end])?;
    request.set_body(&buf[head_end..]);

    if request.is_chunked() {
        let body = read_chunked(stream, &mut request).await?;
        request.set_body(body);
    } else {
        let length = request.content_length().unwrap_or(0);
        if length > MAX_BODY_SIZE {
            return Err(NetworkError::RequestTooLarge(length).into());
        }

        let mut scratch = BytesMut::with_capacity(4096);
        while request.body().len() < length {
            read_more(stream, &mut scratch).await?;
            request.append_body(&scratch);
            scratch.clear();
        }
        let body = request.body()[..length].to_vec();
        request.set_body(body);
    }

    let gzipped = request
        .headers
        .get_ignore_case("Content-Encoding")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
    if gzipped {
        let body = compression::decompress_gzip_limited(request.body(), MAX_BODY_SIZE)
            .map_err(|e| match e {
                CodecError::OutputTooLarge(limit) => {
                    ServerError::from(NetworkError::RequestTooLarge(limit))
                }
                other => other.into(),
            })?;
        request.set_body(body);
    }

    Ok(request)
}

/// Keep reading until the chunked body is complete, then return it decoded
async fn read_chunked<S>(stream: &mut S, request: &mut HttpRequest) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut scratch = BytesMut::with_capacity(4096);
    loop {
        request.reset_chunks();
        match request.read_chunked_body() {
            Ok(body) => return Ok(body),
            Err(HttpError::IncompleteChunk) => {
                if request.body().len() > MAX_BODY_SIZE {
                    return Err(NetworkError::RequestTooLarge(request.body().len()).into());
                }
                read_more(stream, &mut scratch).await?;
                request.append_body(&scratch);
                scratch.clear();
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn read_more<S>(stream: &mut S, buf: &mut BytesMut) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    if stream.read_buf(buf).await? == 0 {
        return Err(NetworkError::ConnectionClosed.into());
    }
    Ok(())
}
