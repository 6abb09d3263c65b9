//! Header fields for requests and responses.
//!
//! Requests fill a [`Headers`] straight from the `httparse` output and read it with
//! case-insensitive lookups and list-token checks (`Connection`, `Transfer-Encoding`,
//! `Content-Length`). Responses mostly [`set`](Headers::set) single-valued fields and encode
//! them onto the wire.

use bytes::{BufMut, BytesMut};

/// Header fields in arrival order.
///
/// Names keep the casing they were given; every lookup ignores ASCII case. A name may
/// appear more than once (`Set-Cookie`, repeated `Vary`).
///
/// # Examples
///
/// ```
/// use nanoroute::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Set-Cookie", "a=1");
/// headers.append("Set-Cookie", "b=2");
/// headers.set("Content-Type", "text/plain");
/// headers.set("content-type", "application/json");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
/// assert_eq!(headers.get_all("set-cookie").count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Replaces every value for `name` with a single field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.fields.push((name, value.into()));
    }

    /// First value for `name`, or `None` when the field is absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The comma-separated list items of every `name` field, trimmed, empty items skipped.
    ///
    /// `Connection: keep-alive, Upgrade` yields `keep-alive` then `Upgrade`.
    pub fn tokens<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.get_all(name)
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
    }

    /// `true` if any list item of `name` equals `token`, ignoring ASCII case.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.tokens(name).any(|item| item.eq_ignore_ascii_case(token))
    }

    /// Removes every field named `name`. Returns `true` if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.fields.len() < before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Appends each field as a `Name: value\r\n` line.
    pub fn encode(&self, buf: &mut BytesMut) {
        for (name, value) in &self.fields {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
    }
}

/// Copies a parsed request head. Fields whose value is not UTF-8 are dropped.
impl From<&[httparse::Header<'_>]> for Headers {
    fn from(raw: &[httparse::Header<'_>]) -> Self {
        let fields = raw
            .iter()
            .filter_map(|header| {
                let value = std::str::from_utf8(header.value).ok()?;
                Some((header.name.to_owned(), value.to_owned()))
            })
            .collect();
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.append("Content-Length", "12");
        assert_eq!(h.get("content-length"), Some("12"));
        assert_eq!(h.get("CONTENT-LENGTH"), Some("12"));
        assert_eq!(h.get("x-missing"), None);
    }

    #[test]
    fn set_replaces_all_previous_values() {
        let mut h = Headers::new();
        h.append("Vary", "Origin");
        h.append("vary", "Accept");
        h.set("VARY", "Cookie");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("vary"), Some("Cookie"));
    }

    #[test]
    fn tokens_span_repeated_fields() {
        let mut h = Headers::new();
        h.append("Connection", "keep-alive, Upgrade");
        h.append("connection", " ,TE");
        let tokens: Vec<_> = h.tokens("connection").collect();
        assert_eq!(tokens, ["keep-alive", "Upgrade", "TE"]);
        assert!(h.has_token("Connection", "upgrade"));
        assert!(!h.has_token("Connection", "close"));
    }

    #[test]
    fn encode_writes_wire_lines() {
        let mut h = Headers::new();
        h.append("Location", "/home");
        h.append("Content-Length", "0");
        let mut buf = BytesMut::new();
        h.encode(&mut buf);
        assert_eq!(&buf[..], b"Location: /home\r\nContent-Length: 0\r\n");
    }

    #[test]
    fn from_parsed_head_skips_non_utf8_values() {
        let raw = [
            httparse::Header {
                name: "Host",
                value: b"example.com",
            },
            httparse::Header {
                name: "X-Blob",
                value: &[0xff, 0xfe],
            },
        ];
        let h = Headers::from(&raw[..]);
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("host"), Some("example.com"));
    }

    #[test]
    fn remove_reports_whether_anything_matched() {
        let mut h = Headers::new();
        h.append("Cookie", "a=1");
        assert!(h.remove("cookie"));
        assert!(!h.remove("cookie"));
        assert!(h.is_empty());
    }
}
