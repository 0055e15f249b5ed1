//! The accept loop: single listener, one thread per accepted
//! connection, keep-alive disabled, no per-request timeout.

use crate::router::Router;
use crate::wire::{self, HttpResponse};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the accept loop until `stop` is set.
///
/// `TcpListener::accept` has no portable way to be interrupted from another
/// thread, so the listener is put in non-blocking mode and the stop flag is
/// polled between attempts. This gives the same externally observable
/// behavior as closing the accept socket: the loop stops accepting
/// connections promptly after `stop()` is set.
pub fn serve(listener: TcpListener, router: Arc<Router>, stop: Arc<AtomicBool>) -> std::io::Result<()> {
    listener.set_nonblocking(true)?;
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                let router = router.clone();
                thread::spawn(move || handle_connection(stream, &router));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, router: &Router) {
    let peer = stream.peer_addr().ok();
    let response = match wire::read_request(&stream) {
        Ok(req) => router.dispatch(&req),
        Err(e) => {
            debug!(?peer, error = %e, "malformed request");
            HttpResponse::text(400, format!("bad request: {e}"))
        }
    };
    if let Err(e) = wire::write_response(&stream, &response) {
        warn!(?peer, error = %e, "failed to write response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn serves_one_request_then_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut router = Router::new();
        router.get("/ping", |_req, _rest| HttpResponse::text(200, "pong"));
        let router = Arc::new(router);
        let stop = Arc::new(AtomicBool::new(false));

        let server_stop = stop.clone();
        let handle = thread::spawn(move || serve(listener, router, server_stop));

        let resp = client::request(&addr.to_string(), "GET", "/ping", &[], Duration::from_secs(2)).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"pong");

        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }
}
