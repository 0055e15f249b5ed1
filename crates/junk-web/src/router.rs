//! Generic request router: the web crate owns the HTTP wire protocol and
//! dispatch; callers (the node binary, the mesh crate) register their own
//! route handlers as closures rather than the router knowing about their
//! domain types.

use crate::wire::{HttpRequest, HttpResponse};
use std::sync::Arc;

pub type Handler = Arc<dyn Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync>;

enum Pattern {
    Exact(String),
    /// Matches any path starting with this prefix; the handler receives the
    /// remainder (e.g. `/browse/` + `a/b` for `/browse/a/b`).
    Prefix(String),
}

struct Route {
    method: &'static str,
    pattern: Pattern,
    handler: Handler,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    pub fn get(
        &mut self,
        path: &str,
        handler: impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.add("GET", Pattern::Exact(path.to_string()), handler)
    }

    pub fn post(
        &mut self,
        path: &str,
        handler: impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.add("POST", Pattern::Exact(path.to_string()), handler)
    }

    pub fn get_prefix(
        &mut self,
        prefix: &str,
        handler: impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.add("GET", Pattern::Prefix(prefix.to_string()), handler)
    }

    pub fn post_prefix(
        &mut self,
        prefix: &str,
        handler: impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.add("POST", Pattern::Prefix(prefix.to_string()), handler)
    }

    fn add(
        &mut self,
        method: &'static str,
        pattern: Pattern,
        handler: impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync + 'static,
    ) -> &mut Self {
        self.routes.push(Route { method, pattern, handler: Arc::new(handler) });
        self
    }

    pub fn dispatch(&self, req: &HttpRequest) -> HttpResponse {
        for route in &self.routes {
            if route.method != req.method {
                continue;
            }
            match &route.pattern {
                Pattern::Exact(p) => {
                    if p == &req.path {
                        return (route.handler)(req, "");
                    }
                }
                Pattern::Prefix(p) => {
                    if let Some(rest) = req.path.strip_prefix(p.as_str()) {
                        return (route.handler)(req, rest.trim_start_matches('/'));
                    }
                }
            }
        }
        HttpResponse::not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(method: &str, path: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn exact_route_matches_only_full_path() {
        let mut router = Router::new();
        router.get("/mesh/status", |_req, _rest| HttpResponse::text(200, "ok"));
        assert_eq!(router.dispatch(&req("GET", "/mesh/status")).status, 200);
        assert_eq!(router.dispatch(&req("GET", "/mesh/statuses")).status, 404);
    }

    #[test]
    fn prefix_route_passes_remainder_to_handler() {
        let mut router = Router::new();
        router.get_prefix("/files/", |_req, rest| HttpResponse::text(200, rest.to_string()));
        let resp = router.dispatch(&req("GET", "/files/a/b.txt"));
        assert_eq!(resp.body, b"a/b.txt");
    }

    #[test]
    fn unmatched_route_is_404() {
        let router = Router::new();
        assert_eq!(router.dispatch(&req("GET", "/nope")).status, 404);
    }

    #[test]
    fn method_mismatch_is_404() {
        let mut router = Router::new();
        router.get("/x", |_req, _rest| HttpResponse::text(200, "ok"));
        assert_eq!(router.dispatch(&req("POST", "/x")).status, 404);
    }
}
