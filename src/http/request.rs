//! HTTP request parsing
//!
//! Parsing covers the request line and headers only. The body is attached by
//! the caller from whatever framing its transport uses, after which chunked
//! bodies can be decoded with [`HttpRequest::next_chunk`].
//!
//! ## Chunked framing
//!
//! ```text
//! <hex size>\r\n<size bytes>\r\n ... 0\r\n\r\n
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::HttpError;
use crate::http::header::Headers;
use crate::http::uri;

/// Request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// No request parsed yet
    #[default]
    None,
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    /// Any other token
    Unknown,
}

impl Method {
    /// Parse a method token (case-sensitive, as on the wire)
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Unknown,
        }
    }

    /// Get the wire name of this method
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Transfer-Encoding` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    None,
    Chunked,
    Compress,
    Deflate,
    Gzip,
    Unknown,
}

impl TransferEncoding {
    /// Parse a header value. Only the last coding of a list is considered,
    /// since that is the one applied outermost.
    pub fn from_header(value: &str) -> Self {
        let last = value.rsplit(',').next().unwrap_or("").trim();
        match last.to_ascii_lowercase().as_str() {
            "" => Self::None,
            "chunked" => Self::Chunked,
            "compress" => Self::Compress,
            "deflate" => Self::Deflate,
            "gzip" => Self::Gzip,
            _ => Self::Unknown,
        }
    }
}

/// Offset just past the `\r\n\r\n` that ends the request head, if present
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// A parsed HTTP request
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Request target, including any `?query`
    pub uri: String,
    /// Protocol version token, e.g. `HTTP/1.1`
    pub version: String,
    /// Headers keyed by name as received
    pub headers: Headers,
    /// Raw body bytes, attached by the caller
    body: BytesMut,
    /// Read position of the chunk decoder within `body`
    chunk_start: usize,
}

impl HttpRequest {
    /// Parse the request line and headers of a raw message.
    ///
    /// Header parsing stops at the first empty (or `\r`-only) line. Anything
    /// after it is ignored; attach the body with [`set_body`](Self::set_body)
    /// or [`append_body`](Self::append_body).
    pub fn parse(raw: &[u8]) -> Result<Self, HttpError> {
        if raw.is_empty() {
            return Err(HttpError::EmptyRequest);
        }

        let mut lines = raw.split(|&b| b == b'\n');

        let request_line = lines.next().ok_or(HttpError::EmptyRequest)?;
        let request_line = std::str::from_utf8(request_line)
            .map_err(|_| HttpError::InvalidEncoding)?
            .trim_end_matches('\r');

        let tokens: Vec<&str> = request_line.split(' ').collect();
        let [method, uri, version] = tokens.as_slice() else {
            return Err(HttpError::MalformedRequestLine(request_line.to_string()));
        };

        let mut headers = Headers::new();
        for line in lines {
            let line = std::str::from_utf8(line).map_err(|_| HttpError::InvalidEncoding)?;
            if line.is_empty() || line == "\r" {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| HttpError::MalformedHeader(line.trim_end_matches('\r').to_string()))?;
            let value = value
                .trim_start_matches([' ', '\r'])
                .trim_end_matches('\r');

            headers.set(name, value);
        }

        Ok(Self {
            method: Method::from_token(method),
            uri: uri.to_string(),
            version: version.to_string(),
            headers,
            body: BytesMut::new(),
            chunk_start: 0,
        })
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        uri::get_path(&self.uri)
    }

    /// Raw query parameter value, empty if absent
    pub fn query(&self, key: &str) -> &str {
        uri::get_query(&self.uri, key)
    }

    /// Header value by exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// `Host` header, matched case-insensitively
    pub fn host(&self) -> Option<&str> {
        self.headers.get_ignore_case("Host")
    }

    /// Declared `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get_ignore_case("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Transfer coding declared by the `Transfer-Encoding` header
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get_ignore_case("Transfer-Encoding")
            .map(TransferEncoding::from_header)
            .unwrap_or_default()
    }

    /// Whether the body uses chunked framing
    pub fn is_chunked(&self) -> bool {
        self.transfer_encoding() == TransferEncoding::Chunked
    }

    /// Raw body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the body and rewind the chunk decoder
    pub fn set_body(&mut self, body: impl AsRef<[u8]>) {
        self.body.clear();
        self.body.extend_from_slice(body.as_ref());
        self.chunk_start = 0;
    }

    /// Append bytes to the body as they arrive from the transport.
    ///
    /// The chunk decoder position is kept, so decoding resumes where it
    /// stopped.
    pub fn append_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Current chunk decoder position within the body
    pub fn chunk_position(&self) -> usize {
        self.chunk_start
    }

    /// Rewind the chunk decoder to the start of the body
    pub fn reset_chunks(&mut self) {
        self.chunk_start = 0;
    }

    /// Decode the next chunk of a chunked body.
    ///
    /// Returns `Ok(Some(chunk))` and advances past it, or `Ok(None)` once the
    /// zero-size terminator is reached. When the size line or the chunk data
    /// has not fully arrived yet, returns [`HttpError::IncompleteChunk`] and
    /// leaves the position untouched so the call can be retried after
    /// [`append_body`](Self::append_body).
    pub fn next_chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
        let pending = &self.body[self.chunk_start..];

        let line_end = pending
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(HttpError::IncompleteChunk)?;

        let size_line =
            std::str::from_utf8(&pending[..line_end]).map_err(|_| HttpError::InvalidEncoding)?;
        // Chunk extensions (";name=value") carry nothing we use
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(size_token, 16)
            .map_err(|_| HttpError::InvalidChunkSize(size_line.to_string()))?;

        if chunk_size == 0 {
            return Ok(None);
        }

        let data_start = line_end + 2;
        let data_end = data_start
            .checked_add(chunk_size)
            .ok_or_else(|| HttpError::InvalidChunkSize(size_line.to_string()))?;
        if pending.len() < data_end + 2 {
            return Err(HttpError::IncompleteChunk);
        }
        if &pending[data_end..data_end + 2] != b"\r\n" {
            return Err(HttpError::MalformedChunk);
        }

        let chunk = Bytes::copy_from_slice(&pending[data_start..data_end]);
        self.chunk_start += data_end + 2;

        Ok(Some(chunk))
    }

    /// Decode every remaining chunk into one buffer, stopping at the
    /// zero-size terminator.
    pub fn read_chunked_body(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}
