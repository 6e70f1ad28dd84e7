use std::time::Duration;

/// Parses a `Retry-After` header value given as delta-seconds.
///
/// Accepts whole or fractional non-negative seconds, surrounded by optional
/// whitespace. HTTP-date values and anything else unparseable yield `None`.
///
/// ```rust
/// use callgate_backoff::parse_retry_after;
/// use std::time::Duration;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
/// assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
/// ```
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let secs = value.parse::<f64>().ok()?;
    if secs.is_sign_negative() {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
