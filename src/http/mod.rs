//! Lightweight HTTP module
//!
//! Converts raw HTTP/1.x messages into structured values and back without a
//! network stack. The caller owns socket I/O and framing:
//! - [`HttpRequest`] parses the request line and headers, and decodes chunked
//!   bodies one chunk at a time
//! - [`HttpResponse`] serializes a status line, headers and body
//! - [`uri`] has path/query helpers and form-style percent encoding
//! - [`header`] has `Date` and `Content-Type` helpers

pub mod header;
pub mod request;
pub mod response;
pub mod uri;

pub use header::Headers;
pub use request::{find_head_end, HttpRequest, Method, TransferEncoding};
pub use response::HttpResponse;
pub use uri::{get_path, get_query, url_decode, url_encode};

/// Default protocol version for built responses
pub const HTTP_VERSION: &str = "HTTP/1.1";
