//! Outbound HTTP/1.1 client used for sync, join, and alternate calls between
//! peers: reuses the response parser from [`crate::wire`], caller-supplied
//! send/recv timeouts, one request per connection.

use crate::wire::{self, HttpResponse, WireError};
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: String, source: std::io::Error },
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Issue one request to `addr` (`host:port`) and return its response.
/// The connection is closed after the single response, matching the
/// server's "keep-alive disabled" contract.
pub fn request(
    addr: &str,
    method: &str,
    path: &str,
    body: &[u8],
    timeout: Duration,
) -> ClientResult<HttpResponse> {
    request_with_content_type(addr, method, path, "application/octet-stream", body, timeout)
}

fn request_with_content_type(
    addr: &str,
    method: &str,
    path: &str,
    content_type: &str,
    body: &[u8],
    timeout: Duration,
) -> ClientResult<HttpResponse> {
    let stream = TcpStream::connect(addr).map_err(|source| ClientError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_read_timeout(Some(timeout)).map_err(WireError::Io)?;
    stream.set_write_timeout(Some(timeout)).map_err(WireError::Io)?;
    wire::write_request(&stream, method, path, addr, content_type, body).map_err(WireError::Io)?;
    Ok(wire::read_response(&stream)?)
}

/// Convenience wrapper for JSON bodies, used by the mesh sync round and the
/// join/alternate flows.
pub fn post_json(
    addr: &str,
    path: &str,
    value: &impl serde::Serialize,
    timeout: Duration,
) -> ClientResult<HttpResponse> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    request_with_content_type(addr, "POST", path, "application/json", &body, timeout)
}
