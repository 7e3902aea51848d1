//! The per-request dispatch logic: method dispatch, conditional GET,
//! insert-vs-overwrite POST, and storage-backend selection via the
//! non-standard `database` extension header. Follows the
//! `handle_get`-returns-response shape used elsewhere in this codebase,
//! generalized to the two storage backends and the three recognized
//! methods this server supports — DELETE, CGI, uploads, redirects, and
//! sessions are out of scope and have no counterpart here.

use crate::http::date::parse_http_date;
use crate::http::{HttpRequest, HttpResponse, Method, ParseError, StatusCode};
use crate::storage::{FsBackend, RecordStoreBackend, UpsertOutcome};

/// Owns both storage backends for the lifetime of a worker process. Each
/// worker opens its own handle at startup; serialization across processes
/// is the backends' own job (named semaphores), not this type's.
pub struct Backends {
    pub fs: FsBackend,
    pub record_store: RecordStoreBackend,
}

impl Backends {
    pub fn new(fs: FsBackend, record_store: RecordStoreBackend) -> Self {
        Backends { fs, record_store }
    }
}

/// Maps a framing failure straight to a response, since a request that
/// never finished parsing never reaches `perform_method`.
pub fn response_for_parse_error(err: &ParseError) -> HttpResponse {
    HttpResponse::new(err.status_code())
}

/// The entry point the worker loop calls once it holds a parsed request.
/// Unknown methods are rejected before any storage backend is touched.
pub fn perform_method(request: &HttpRequest, backends: &Backends) -> crate::error::Result<HttpResponse> {
    match request.method {
        Some(Method::Get) | Some(Method::Head) => handle_get(request, backends),
        Some(Method::Post) => handle_post(request, backends),
        None => Ok(HttpResponse::not_implemented()),
    }
}

/// Shared by GET and HEAD — the method engine never builds a HEAD-shaped
/// response; it always assembles the full GET response and leaves
/// dropping the body to the codec's `to_bytes_headers_only`, so status
/// and headers (including `Content-Length`) can never drift from GET's
/// for the same URI.
fn handle_get(request: &HttpRequest, backends: &Backends) -> crate::error::Result<HttpResponse> {
    let uri = &request.uri;
    let use_record_store = request.headers.wants_record_store();

    let last_modified = if use_record_store {
        backends.record_store.last_modified(uri)?
    } else {
        match backends.fs.last_modified(uri) {
            Ok(time) => Some(time.into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        }
    };

    let Some(last_modified) = last_modified else {
        return Ok(HttpResponse::new(StatusCode::NotFound));
    };

    if let Some(if_modified_since) = request.headers.if_modified_since() {
        if let Some(threshold) = parse_http_date(if_modified_since) {
            if last_modified < threshold {
                return Ok(HttpResponse::new(StatusCode::NotModified));
            }
        }
    }

    let body = if use_record_store {
        backends
            .record_store
            .fetch_body(uri)?
            .unwrap_or_default()
    } else {
        match backends.fs.read(uri) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HttpResponse::new(StatusCode::NotFound))
            }
            Err(e) => return Err(e.into()),
        }
    };

    let response = HttpResponse::new(StatusCode::Ok)
        .with_header("Content-Type", "text/html")
        .with_body(body);

    Ok(response)
}

fn handle_post(request: &HttpRequest, backends: &Backends) -> crate::error::Result<HttpResponse> {
    let content_length = match request.headers.content_length() {
        Some(Ok(len)) => len,
        Some(Err(_)) | None => return Ok(HttpResponse::new(StatusCode::BadRequest)),
    };
    let body = &request.body[..content_length.min(request.body.len())];

    let uri = &request.uri;
    let outcome = if request.headers.wants_record_store() {
        backends.record_store.upsert(uri, body)?
    } else {
        backends.fs.write(uri, body)?
    };

    let status = match outcome {
        UpsertOutcome::Inserted => StatusCode::Created,
        UpsertOutcome::Overwritten => StatusCode::Ok,
    };

    Ok(HttpResponse::new(status)
        .with_header("Content-Type", "text/html")
        .with_body(body.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::date::format_http_date;
    use crate::http::Headers;

    fn request(method: Method, uri: &str, headers: Headers, body: Vec<u8>) -> HttpRequest {
        HttpRequest {
            method_token: match method {
                Method::Get => "GET".into(),
                Method::Head => "HEAD".into(),
                Method::Post => "POST".into(),
            },
            method: Some(method),
            uri: uri.to_string(),
            version: "HTTP/1.0".to_string(),
            headers,
            body,
        }
    }

    fn backends(dir: &std::path::Path) -> Backends {
        let fs = FsBackend::new(dir.join("fs_root"));
        let record_store = RecordStoreBackend::open(dir.join("store")).unwrap();
        Backends::new(fs, record_store)
    }

    #[test]
    fn get_on_unknown_uri_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());
        let req = request(Method::Get, "/nope.html", Headers::default(), Vec::new());
        let resp = perform_method(&req, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::NotFound);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn post_then_get_round_trips_on_filesystem_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());

        let mut headers = Headers::default();
        headers.entity.push(("content-length".into(), "5".into()));
        let post = request(Method::Post, "/hello.html", headers, b"hello".to_vec());
        let resp = perform_method(&post, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::Created);
        assert_eq!(resp.body, b"hello");

        let get = request(Method::Get, "/hello.html", Headers::default(), Vec::new());
        let resp = perform_method(&get, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn second_post_overwrites_and_returns_200() {
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());

        let mut headers = Headers::default();
        headers.entity.push(("content-length".into(), "5".into()));
        let first = request(Method::Post, "/a.html", headers.clone(), b"hello".to_vec());
        let resp = perform_method(&first, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::Created);

        let second = request(Method::Post, "/a.html", headers, b"world".to_vec());
        let resp = perform_method(&second, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.body, b"world");
    }

    #[test]
    fn head_matches_get_status_and_headers_but_serializes_without_a_body() {
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());

        let mut headers = Headers::default();
        headers.entity.push(("content-length".into(), "5".into()));
        let post = request(Method::Post, "/x.html", headers, b"hello".to_vec());
        perform_method(&post, &backends).unwrap();

        let get = request(Method::Get, "/x.html", Headers::default(), Vec::new());
        let head = request(Method::Head, "/x.html", Headers::default(), Vec::new());
        let get_resp = perform_method(&get, &backends).unwrap();
        let head_resp = perform_method(&head, &backends).unwrap();

        // The method engine builds the same response object for GET and
        // HEAD — dropping the body is the codec's job at serialization
        // time, so `Content-Length` can never drift between the two.
        assert_eq!(get_resp.status, head_resp.status);
        assert_eq!(get_resp.headers, head_resp.headers);
        assert_eq!(get_resp.body, head_resp.body);
        assert!(!get_resp.body.is_empty());
        assert!(head_resp.to_bytes_headers_only().ends_with(b"\r\n\r\n"));
        assert_ne!(head_resp.to_bytes_headers_only(), head_resp.to_bytes());
    }

    #[test]
    fn record_store_conditional_get_returns_304() {
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());

        let mut headers = Headers::default();
        headers.entity.push(("content-length".into(), "2".into()));
        headers.extension.push(("database".into(), "true".into()));
        let post = request(Method::Post, "/k", headers, b"hi".to_vec());
        let resp = perform_method(&post, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::Created);

        let future = format_http_date(std::time::SystemTime::now() + std::time::Duration::from_secs(3600));
        let mut get_headers = Headers::default();
        get_headers.request.push(("if-modified-since".into(), future));
        get_headers.extension.push(("database".into(), "true".into()));
        let get = request(Method::Get, "/k", get_headers, Vec::new());
        let resp = perform_method(&get, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::NotModified);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn unknown_method_is_501_no_headers_no_body() {
        let mut req = request(Method::Get, "/x", Headers::default(), Vec::new());
        req.method = None;
        req.method_token = "DELETE".to_string();
        let dir = tempfile::tempdir().unwrap();
        let backends = backends(dir.path());
        let resp = perform_method(&req, &backends).unwrap();
        assert_eq!(resp.status, StatusCode::NotImplemented);
        assert!(resp.headers.is_empty());
        assert!(resp.body.is_empty());
    }
}
