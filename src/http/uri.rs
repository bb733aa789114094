//! URI helpers
//!
//! Values returned by [`get_query`] are raw; run them through [`url_decode`]
//! when the client form-encodes its parameters.

/// Path part of a URI (everything before the first `?`)
pub fn get_path(uri: &str) -> &str {
    match uri.find('?') {
        Some(pos) => &uri[..pos],
        None => uri,
    }
}

/// Raw value of `key` in the query string, or an empty string if absent.
///
/// Takes the first occurrence of `"{key}="` in the query string and returns
/// everything up to the next `&`. The match is a plain substring search, so
/// `id` also matches inside `userid=`. A present-but-empty key also yields
/// an empty string.
pub fn get_query<'a>(uri: &'a str, key: &str) -> &'a str {
    let Some(pos) = uri.find('?') else {
        return "";
    };
    let query = &uri[pos + 1..];

    let needle = format!("{}=", key);
    let Some(key_pos) = query.find(&needle) else {
        return "";
    };

    let value = &query[key_pos + needle.len()..];
    match value.find('&') {
        Some(end) => &value[..end],
        None => value,
    }
}

pub fn url_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Decode `%XX` escapes and `+` as space.
///
/// Malformed escapes are kept literally.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_path() {
        assert_eq!(get_path("/a/b?x=1"), "/a/b");
        assert_eq!(get_path("/a/b"), "/a/b");
        assert_eq!(get_path("?x=1"), "");
    }

    #[test]
    fn test_get_query() {
        let uri = "/a/b?x=1&name=homer&empty=";
        assert_eq!(get_query(uri, "x"), "1");
        assert_eq!(get_query(uri, "name"), "homer");
        assert_eq!(get_query(uri, "empty"), "");
        assert_eq!(get_query(uri, "y"), "");
        assert_eq!(get_query("/a/b", "x"), "");
    }

    #[test]
    fn test_get_query_takes_first_occurrence() {
        assert_eq!(get_query("/land?userid=5&id=7", "id"), "5");
        assert_eq!(get_query("/land?userid=5", "id"), "5");
        assert_eq!(get_query("/land?a=1&a=2", "a"), "1");
        // keys are only searched after the '?'
        assert_eq!(get_query("/id=9?x=1", "id"), "");
    }

    #[test]
    fn test_get_query_is_not_decoded() {
        assert_eq!(get_query("/x?q=a%20b+c", "q"), "a%20b+c");
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("abc-_.~XYZ09"), "abc-_.~XYZ09");
        assert_eq!(url_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(url_encode("ü"), "%C3%BC");
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("a%20b+c"), "a b c");
        assert_eq!(url_decode("%2fpath%2F"), "/path/");
        assert_eq!(url_decode("%C3%BC"), "ü");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
    }

    #[test]
    fn test_encode_decode_inverse() {
        let original = "springfield town #42 & friends";
        assert_eq!(url_decode(&url_encode(original)), original);
    }
}
