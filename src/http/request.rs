use std::io::Read;

use crate::prelude::*;

/// Recognized methods. Anything else is dispatched as unknown by the method
/// engine (501, no headers, no body) — matched case-sensitively against the
/// wire token, never normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    fn parse(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    IncompleteRequestLine,
    MalformedRequestLine,
    InvalidHeaderLine,
    HeaderSectionTooLarge,
    InvalidContentLength,
    PayloadTooLarge,
    UnexpectedEof,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::IncompleteRequestLine => write!(f, "incomplete request line"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::InvalidHeaderLine => write!(f, "invalid header line"),
            ParseError::HeaderSectionTooLarge => write!(f, "header section too large"),
            ParseError::InvalidContentLength => write!(f, "invalid content-length"),
            ParseError::PayloadTooLarge => write!(f, "payload too large"),
            ParseError::UnexpectedEof => write!(f, "unexpected eof"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Maps a framing failure onto the status the method engine should answer
/// with, since an unparseable request never reaches the dispatch logic.
impl ParseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ParseError::PayloadTooLarge => StatusCode::BadRequest,
            _ => StatusCode::BadRequest,
        }
    }
}

/// The four fixed, ordered header classes from the data model. Classification
/// is by a case-insensitive match against a fixed table; anything that
/// doesn't match general/request/entity falls through to extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    General,
    Request,
    Entity,
    Extension,
}

const GENERAL_HEADERS: &[&str] = &["date", "pragma"];
const REQUEST_HEADERS: &[&str] = &[
    "authorization",
    "from",
    "if-modified-since",
    "referer",
    "user-agent",
];
const ENTITY_HEADERS: &[&str] = &[
    "allow",
    "content-encoding",
    "content-length",
    "content-type",
    "expires",
    "last-modified",
];

pub fn classify_header(name: &str) -> HeaderClass {
    let lower = name.to_ascii_lowercase();
    if GENERAL_HEADERS.contains(&lower.as_str()) {
        HeaderClass::General
    } else if REQUEST_HEADERS.contains(&lower.as_str()) {
        HeaderClass::Request
    } else if ENTITY_HEADERS.contains(&lower.as_str()) {
        HeaderClass::Entity
    } else {
        HeaderClass::Extension
    }
}

/// Headers bucketed into their class, each class preserving arrival order.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    pub general: Vec<(String, String)>,
    pub request: Vec<(String, String)>,
    pub entity: Vec<(String, String)>,
    pub extension: Vec<(String, String)>,
}

impl Headers {
    fn insert(&mut self, name: String, value: String) {
        match classify_header(&name) {
            HeaderClass::General => self.general.push((name, value)),
            HeaderClass::Request => self.request.push((name, value)),
            HeaderClass::Entity => self.entity.push((name, value)),
            HeaderClass::Extension => self.extension.push((name, value)),
        }
    }

    /// Case-insensitive lookup across all four classes, first match wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        for bucket in [&self.general, &self.request, &self.entity, &self.extension] {
            if let Some((_, v)) = bucket.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                return Some(v.as_str());
            }
        }
        None
    }

    pub fn content_length(&self) -> Option<Result<usize, ParseError>> {
        self.get("content-length")
            .map(|v| v.trim().parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
    }

    pub fn if_modified_since(&self) -> Option<&str> {
        self.get("if-modified-since")
    }

    /// The non-standard extension header selecting the storage backend.
    /// Absent or anything other than "true" (case-insensitively) means
    /// the filesystem backend.
    pub fn wants_record_store(&self) -> bool {
        self.get("database")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method_token: String,
    pub method: Option<Method>,
    pub uri: String,
    pub version: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

const MAX_HEADER_SECTION: usize = 64 * 1024;
const MAX_BODY_SIZE: usize = _1MB * 8;

/// Reads one complete HTTP/1.0 request from a blocking stream: grows a
/// buffer until the CRLFCRLF terminator is found, splits out the
/// request-line and headers, classifies each header, then reads exactly
/// Content-Length bytes of body if an entity header declares one. There is
/// no chunked transfer-coding in HTTP/1.0 — the absence of Content-Length
/// simply means no body is read.
pub fn read_request<R: Read>(reader: &mut R) -> std::result::Result<HttpRequest, ParseError> {
    let mut buf = Vec::with_capacity(READ_BUF_SIZE);
    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > MAX_HEADER_SECTION {
            return Err(ParseError::HeaderSectionTooLarge);
        }
        let mut chunk = [0u8; READ_BUF_SIZE];
        let n = reader.read(&mut chunk).map_err(|_| ParseError::UnexpectedEof)?;
        if n == 0 {
            return Err(ParseError::UnexpectedEof);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let header_bytes = &buf[..header_end - 4];
    let header_str =
        std::str::from_utf8(header_bytes).map_err(|_| ParseError::MalformedRequestLine)?;
    let mut lines = header_str.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::IncompleteRequestLine)?;
    let parts: Vec<&str> = request_line.split(' ').collect();
    if parts.len() != 3 {
        return Err(ParseError::MalformedRequestLine);
    }
    let method_token = parts[0].to_string();
    let method = Method::parse(&method_token);
    let uri = parts[1].to_string();
    let version = parts[2].to_string();

    let mut headers = Headers::default();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let colon = line.find(':').ok_or(ParseError::InvalidHeaderLine)?;
        let name = line[..colon].trim().to_ascii_lowercase();
        let value = line[colon + 1..].trim().to_string();
        if name.is_empty() {
            return Err(ParseError::InvalidHeaderLine);
        }
        headers.insert(name, value);
    }

    let mut body = buf[header_end..].to_vec();
    if let Some(len_result) = headers.content_length() {
        let content_length = len_result?;
        if content_length > MAX_BODY_SIZE {
            return Err(ParseError::PayloadTooLarge);
        }
        while body.len() < content_length {
            let mut chunk = [0u8; READ_BUF_SIZE];
            let n = reader.read(&mut chunk).map_err(|_| ParseError::UnexpectedEof)?;
            if n == 0 {
                return Err(ParseError::UnexpectedEof);
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(content_length);
    } else {
        body.clear();
    }

    Ok(HttpRequest {
        method_token,
        method,
        uri,
        version,
        headers,
        body,
    })
}

/// Cursor-based byte-slice search, used instead of a strtok-style global
/// tokenizer.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
