//! HTTP response building

use bytes::{BufMut, BytesMut};

use crate::http::header::{self, Headers};
use crate::http::HTTP_VERSION;

/// An HTTP response ready to be serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub version: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status_code: 200,
            status_text: "OK".to_string(),
            version: HTTP_VERSION.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    /// Create a response with the given status
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            ..Self::default()
        }
    }

    /// 200 OK with a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::default().with_json(value)
    }

    /// Error response with a JSON `{"success": false, "error": ...}` body
    pub fn error(status_code: u16, status_text: &str, message: &str) -> Self {
        Self::new(status_code, status_text).with_json(&serde_json::json!({
            "success": false,
            "error": message,
        }))
    }

    /// Set a header, replacing any previous value under the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header("Content-Type", header::content_type("json"))
            .with_body(value.to_string())
    }

    /// Serialize the status line, headers, blank line and body.
    ///
    /// Headers are written in insertion order and the body is appended
    /// unchanged. No headers are added implicitly.
    pub fn build(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(64 + self.body.len());

        out.put_slice(
            format!(
                "{} {} {}\r\n",
                self.version, self.status_code, self.status_text
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);

        out.to_vec()
    }
}
