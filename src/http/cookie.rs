//! `Cookie` request-header parsing.
//!
//! Pairs are split on `;` and then on the first `=`. Names and values are trimmed but
//! otherwise left as sent: no percent-decoding and no quote stripping.

use std::collections::HashMap;

/// Cookie name → value, as sent by the client.
pub type Cookies = HashMap<String, String>;

/// Parses a `Cookie` header value.
///
/// A pair without `=` is kept with an empty value. Later duplicates overwrite earlier ones.
///
/// # Examples
///
/// ```
/// use nanoroute::http::cookie::parse_cookies;
///
/// let cookies = parse_cookies("session=abc123; theme=dark");
/// assert_eq!(cookies.get("session").map(String::as_str), Some("abc123"));
/// assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
/// ```
pub fn parse_cookies(header: &str) -> Cookies {
    header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.trim().to_owned(), value.trim().to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}
