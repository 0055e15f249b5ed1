//! Hand-rolled HTTP/1.1 wire format: request-line + header parsing shared
//! by the server's accept loop and the outbound sync client.

use std::io::{BufRead, BufReader, Read, Write};

/// Request line + headers, from both directions, must fit in this many bytes.
const MAX_HEAD_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        HttpResponse {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.into().into_bytes())
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/html; charset=utf-8", body.into().into_bytes())
    }

    pub fn json(status: u16, value: &impl serde::Serialize) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(status, "application/json", body)
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self::new(status, "application/octet-stream", body)
    }

    pub fn not_found() -> Self {
        Self::text(404, "not found")
    }

    pub fn from_error(e: &junk_core::Error) -> Self {
        Self::text(e.to_http_status(), e.to_string())
    }

    pub fn reason(&self) -> &'static str {
        reason_phrase(self.status)
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        504 => "Gateway Timeout",
        507 => "Insufficient Storage",
        _ => "Unknown",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("request head exceeds 8 KiB limit")]
    HeadTooLarge,
    #[error("malformed start line")]
    MalformedStartLine,
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    #[error("negative content-length")]
    NegativeContentLength,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WireResult<T> = Result<T, WireError>;

/// Read one HTTP/1.1 request: request line + headers (≤8 KiB total) + body
/// sized by `Content-Length` (connections are not kept alive, so there is
/// never more than one request per socket).
pub fn read_request<R: Read>(stream: R) -> WireResult<HttpRequest> {
    let mut reader = BufReader::new(stream);
    let mut budget = MAX_HEAD_BYTES;

    let start_line = read_line(&mut reader, &mut budget)?;
    let mut parts = start_line.split_whitespace();
    let method = parts.next().ok_or(WireError::MalformedStartLine)?.to_string();
    let raw_path = parts.next().ok_or(WireError::MalformedStartLine)?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();

    let headers = read_headers(&mut reader, &mut budget)?;
    let content_length = parse_content_length(&headers)?;
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(HttpRequest { method, path, headers, body })
}

/// Write an HTTP/1.1 response: status line, `Content-Type`/`Content-Length`,
/// `Connection: close` (keep-alive is never offered), then the body.
pub fn write_response<W: Write>(mut w: W, resp: &HttpResponse) -> std::io::Result<()> {
    write!(w, "HTTP/1.1 {} {}\r\n", resp.status, resp.reason())?;
    write!(w, "Content-Type: {}\r\n", resp.content_type)?;
    write!(w, "Content-Length: {}\r\n", resp.body.len())?;
    write!(w, "Connection: close\r\n\r\n")?;
    w.write_all(&resp.body)?;
    w.flush()
}

/// Write an HTTP/1.1 request (client side, used by the outbound sync client).
pub fn write_request<W: Write>(
    mut w: W,
    method: &str,
    path: &str,
    host: &str,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()> {
    write!(w, "{method} {path} HTTP/1.1\r\n")?;
    write!(w, "Host: {host}\r\n")?;
    write!(w, "Content-Type: {content_type}\r\n")?;
    write!(w, "Content-Length: {}\r\n", body.len())?;
    write!(w, "Connection: close\r\n\r\n")?;
    w.write_all(body)?;
    w.flush()
}

/// Read an HTTP/1.1 response (client side): reuses the same head parser and
/// `Content-Length`-bounded body read as `read_request`.
pub fn read_response<R: Read>(stream: R) -> WireResult<HttpResponse> {
    let mut reader = BufReader::new(stream);
    let mut budget = MAX_HEAD_BYTES;

    let start_line = read_line(&mut reader, &mut budget)?;
    let mut parts = start_line.splitn(3, ' ');
    let _version = parts.next().ok_or(WireError::MalformedStartLine)?;
    let status: u16 = parts
        .next()
        .ok_or(WireError::MalformedStartLine)?
        .parse()
        .map_err(|_| WireError::MalformedStartLine)?;

    let headers = read_headers(&mut reader, &mut budget)?;
    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let content_length = parse_content_length(&headers)?;
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(HttpResponse { status, content_type, body })
}

fn read_line<R: Read>(reader: &mut BufReader<R>, budget: &mut usize) -> WireResult<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(WireError::MalformedStartLine);
    }
    if n > *budget {
        return Err(WireError::HeadTooLarge);
    }
    *budget -= n;
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| WireError::MalformedStartLine)
}

fn read_headers<R: Read>(
    reader: &mut BufReader<R>,
    budget: &mut usize,
) -> WireResult<Vec<(String, String)>> {
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader, budget)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WireError::MalformedHeader(line.clone()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

fn parse_content_length(headers: &[(String, String)]) -> WireResult<usize> {
    let raw = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.as_str());
    match raw {
        None => Ok(0),
        Some(v) => {
            if v.trim_start().starts_with('-') {
                return Err(WireError::NegativeContentLength);
            }
            v.trim()
                .parse::<usize>()
                .map_err(|_| WireError::MalformedHeader(format!("content-length {v:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_body() {
        let raw = b"POST /chunks/abc HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let req = read_request(&raw[..]).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/chunks/abc");
        assert_eq!(req.header("host"), Some("x"));
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn strips_query_string_from_path() {
        let raw = b"GET /browse/a?foo=bar HTTP/1.1\r\n\r\n";
        let req = read_request(&raw[..]).unwrap();
        assert_eq!(req.path, "/browse/a");
    }

    #[test]
    fn missing_content_length_means_empty_body() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let req = read_request(&raw[..]).unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn negative_content_length_is_rejected() {
        let raw = b"POST /chunks/abc HTTP/1.1\r\nContent-Length: -5\r\n\r\n";
        let err = read_request(&raw[..]).unwrap_err();
        assert!(matches!(err, WireError::NegativeContentLength));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let mut raw = b"GET /".to_vec();
        raw.extend(std::iter::repeat(b'a').take(9 * 1024));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let err = read_request(&raw[..]).unwrap_err();
        assert!(matches!(err, WireError::HeadTooLarge));
    }

    #[test]
    fn response_round_trips_through_write_and_read() {
        let resp = HttpResponse::text(200, "hi there");
        let mut buf = Vec::new();
        write_response(&mut buf, &resp).unwrap();
        let parsed = read_response(&buf[..]).unwrap();
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, b"hi there");
    }
}
