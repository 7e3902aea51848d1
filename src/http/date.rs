use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::SystemTime;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats a timestamp as an RFC 1123 HTTP-date, used for both
/// `Last-Modified` and the record store's timestamp field. `chrono` is used
/// here rather than a hand-rolled formatter because this date feeds
/// correctness-bearing comparisons (conditional GET), unlike the informal
/// timestamps `proxy_log` prints to the console.
pub fn format_http_date(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an RFC 1123 HTTP-date. Returns `None` on any malformed
/// `If-Modified-Since` value rather than treating it as a framing error —
/// the request is still well-formed, the conditional is just ignored.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
