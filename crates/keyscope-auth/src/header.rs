//! `Authorization` header parsing.

/// Extract the key from an `Authorization` header value of the form
/// `<keyword> <key>`.
///
/// The keyword is matched case-insensitively. A missing key, a missing
/// separator, or a different keyword yields `None`: the request simply
/// carries no API key credential.
pub fn parse_authorization<'a>(header: &'a str, keyword: &str) -> Option<&'a str> {
    let (scheme, key) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}
