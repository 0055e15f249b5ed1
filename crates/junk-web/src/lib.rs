//! Hand-rolled HTTP/1.1 web service: wire protocol, a generic
//! router, the accept loop, and the built-in chunk/file/browse handlers.
//! Mesh-specific `/mesh/*` routes are registered onto [`Router`] by
//! `junk-mesh`/the node binary rather than living in this crate, so this
//! crate has no dependency on `junk-mesh`.

mod client;
mod handlers;
mod router;
mod safepath;
mod server;
mod wire;

pub use client::{post_json, request, ClientError, ClientResult};
pub use handlers::{browse_handler, chunk_get_handler, chunk_post_handler, files_handler};
pub use router::Router;
pub use safepath::parse_relative;
pub use server::serve;
pub use wire::{read_request, read_response, write_request, write_response, HttpRequest, HttpResponse, WireError};
