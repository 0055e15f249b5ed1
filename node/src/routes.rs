//! `/mesh/*` HTTP routes: wires `junk_mesh`'s logic onto `junk_web::Router`.
//! Lives in the node binary because registering these routes needs both
//! crates, and neither crate should depend on the other just for this.

use junk_config::{Config, ConfigStore, NodeState, Peer};
use junk_core::Error;
use junk_mesh::{Coordinator, JoinConfig, MeshState};
use junk_web::{HttpRequest, HttpResponse, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const JOIN_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// The subset of [`Config`] exposed over `GET /mesh/config`. Bootstrap list
/// and public identity are shared with peers; the private key never
/// crosses the wire.
#[derive(Debug, Serialize)]
struct MeshConfigView {
    node_state: NodeState,
    public_key: String,
    endpoint: String,
    wg_ip: String,
    web_port: u16,
    listen_port: u16,
    bootstrap_peers: Vec<String>,
    bootstrap_peers_updated_at: u64,
}

impl MeshConfigView {
    fn from_config(cfg: &Config) -> Self {
        MeshConfigView {
            node_state: cfg.node_state,
            public_key: cfg.wireguard.public_key.clone(),
            endpoint: cfg.wireguard.endpoint.clone(),
            wg_ip: cfg.wireguard.wg_ip.clone(),
            web_port: cfg.web_port,
            listen_port: cfg.wireguard.listen_port,
            bootstrap_peers: cfg.bootstrap_peers.clone(),
            bootstrap_peers_updated_at: cfg.bootstrap_peers_updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigUpdateRequest {
    #[serde(default)]
    bootstrap_peers: Option<Vec<String>>,
    #[serde(default)]
    wg_peers: Option<Vec<Peer>>,
    #[serde(default)]
    node_state: Option<NodeState>,
}

#[derive(Debug, Serialize)]
struct StatusView {
    role: junk_mesh::Role,
    standalone: bool,
    active: bool,
    reachability: std::collections::HashMap<String, junk_mesh::Reachability>,
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    #[serde(flatten)]
    join: JoinConfig,
    #[serde(default)]
    allow_alternate: bool,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    synced: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusOk {
    status: &'static str,
}

fn parse_body<T: for<'de> Deserialize<'de>>(req: &HttpRequest) -> Result<T, HttpResponse> {
    serde_json::from_slice(&req.body)
        .map_err(|e| HttpResponse::from_error(&Error::InvalidArgument(format!("malformed JSON body: {e}"))))
}

/// Register every `/mesh/*` route onto `router`, plus the opaque HTML shell
/// at `/mesh/ui` and `/mesh`.
pub fn register(router: &mut Router, store: ConfigStore, coordinator: Arc<Coordinator>) {
    {
        let store = store.clone();
        router.get("/mesh/peers", move |_req, _rest| {
            HttpResponse::json(200, &MeshState::from_config(&store.snapshot()))
        });
    }

    {
        let store = store.clone();
        router.get("/mesh/config", move |_req, _rest| {
            HttpResponse::json(200, &MeshConfigView::from_config(&store.snapshot()))
        });
    }

    {
        let store = store.clone();
        router.post("/mesh/config", move |req, _rest| {
            let update: ConfigUpdateRequest = match parse_body(req) {
                Ok(u) => u,
                Err(resp) => return resp,
            };
            if let Some(peers) = update.wg_peers {
                if let Err(e) = store.set_peers(peers) {
                    return HttpResponse::from_error(&e);
                }
            }
            if let Some(bootstrap) = update.bootstrap_peers {
                if bootstrap.len() > junk_config::MAX_BOOTSTRAP_PEERS {
                    return HttpResponse::from_error(&Error::PeerFull);
                }
                if let Err(e) = store.set_bootstrap_peers(bootstrap) {
                    return HttpResponse::from_error(&e);
                }
            }
            if let Some(state) = update.node_state {
                if let Err(e) = store.set_node_state(state) {
                    return HttpResponse::from_error(&e);
                }
            }
            HttpResponse::json(200, &MeshConfigView::from_config(&store.snapshot()))
        });
    }

    {
        let store = store.clone();
        let coordinator = coordinator.clone();
        router.get("/mesh/status", move |_req, _rest| {
            let cfg = store.snapshot();
            let reachability = coordinator.reachability();
            HttpResponse::json(
                200,
                &StatusView {
                    role: junk_mesh::derive_role(&cfg, &reachability),
                    standalone: junk_mesh::is_standalone(&cfg),
                    active: junk_mesh::is_active(&cfg),
                    reachability: reachability.snapshot(),
                },
            )
        });
    }

    {
        let store = store.clone();
        router.post("/mesh/peers", move |req, _rest| {
            let incoming: MeshState = match parse_body(req) {
                Ok(m) => m,
                Err(resp) => return resp,
            };
            junk_mesh::merge_incoming(&store, &incoming);
            HttpResponse::json(200, &MeshState::from_config(&store.snapshot()))
        });
    }

    {
        let store = store.clone();
        router.post("/mesh/bootstrap", move |_req, _rest| match junk_mesh::mint_bootstrap(&store) {
            Ok(join) => HttpResponse::json(200, &join),
            Err(e) => HttpResponse::from_error(&e),
        });
    }

    {
        let store = store.clone();
        router.post("/mesh/join", move |req, _rest| {
            let request: JoinRequest = match parse_body(req) {
                Ok(j) => j,
                Err(resp) => return resp,
            };
            let result = if request.allow_alternate {
                junk_mesh::adopt_join_with_alternate(&store, &request.join, JOIN_HTTP_TIMEOUT)
            } else {
                junk_mesh::adopt_join(&store, &request.join)
            };
            match result {
                Ok(()) => HttpResponse::json(200, &StatusOk { status: "ok" }),
                Err(e) => HttpResponse::from_error(&e),
            }
        });
    }

    {
        let store = store.clone();
        router.post("/mesh/alternate", move |req, _rest| {
            let update: junk_mesh::AlternateUpdate = match parse_body(req) {
                Ok(u) => u,
                Err(resp) => return resp,
            };
            match junk_mesh::apply_alternate(&store, &update) {
                Ok(_) => HttpResponse::json(200, &StatusOk { status: "ok" }),
                Err(e) => HttpResponse::from_error(&e),
            }
        });
    }

    {
        let coordinator = coordinator.clone();
        router.post("/mesh/sync", move |_req, _rest| {
            let synced = coordinator.sync_once();
            HttpResponse::json(200, &SyncResponse { synced })
        });
    }

    router.get("/mesh/ui", |_req, _rest| HttpResponse::html(200, mesh_ui_shell()));
    router.get("/mesh", |_req, _rest| HttpResponse::html(200, mesh_ui_shell()));
}

/// The dashboard's HTML shell. This returns a minimal placeholder page
/// that a browser dashboard script can attach to and drive via the JSON
/// routes above; the dashboard itself is an external collaborator, not
/// something this binary renders.
fn mesh_ui_shell() -> &'static str {
    "<!doctype html><html><head><title>junkNAS mesh</title></head>\
<body><div id=\"app\">loading mesh state&hellip;</div>\
<script src=\"/static/mesh-ui.js\"></script></body></html>\n"
}
