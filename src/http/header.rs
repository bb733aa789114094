//! Header storage and common header values

use chrono::Utc;

/// Header list preserving insertion order.
///
/// Names are stored as received. Setting an existing name replaces its value
/// in place, so the last write wins without reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header list
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any value stored under the exact same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Get a header by exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header ignoring ASCII case
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove a header by exact name, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Current time formatted for the `Date` header
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Content type for a file extension (without the leading dot)
pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "zip" => "application/zip",
        "pb" => "application/x-protobuf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_in_place() {
        let mut headers = Headers::new();
        headers.set("Host", "a");
        headers.set("Accept", "*/*");
        headers.set("Host", "b");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("Host", "b"), ("Accept", "*/*")]);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut headers = Headers::new();
        headers.set("content-length", "4");

        assert_eq!(headers.get("Content-Length"), None);
        assert_eq!(headers.get_ignore_case("Content-Length"), Some("4"));
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.set("X-A", "1");
        assert_eq!(headers.remove("X-A"), Some("1".to_string()));
        assert!(headers.is_empty());
        assert_eq!(headers.remove("X-A"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(""), "text/plain");
        assert_eq!(content_type("json"), "application/json");
        assert_eq!(content_type("zip"), "application/zip");
        assert_eq!(content_type("exe"), "application/octet-stream");
    }

    #[test]
    fn test_http_date_shape() {
        let date = http_date();
        assert!(date.ends_with(" GMT"));
        // e.g. "Mon, 19 Oct 2026 12:00:00 GMT"
        assert_eq!(date.len(), 29);
        assert_eq!(&date[3..5], ", ");
    }
}
