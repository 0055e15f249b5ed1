//! End-to-end mesh exercises over real loopback HTTP connections, wiring
//! `junk-mesh` route registration exactly as the node binary does, without
//! a FUSE mount (the mesh routes never touch the filesystem layer).

use junk_config::{ConfigStore, NodeState};
use junk_mesh::{Coordinator, NullWireGuard};
use junk_web::Router;
use serde_json::{json, Value};
use std::io::Write as _;
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod support {
    include!("../src/routes.rs");
}

struct Node {
    addr: String,
    store: ConfigStore,
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Node {
    fn start(dir: &Path, interface_wg_ip: &str) -> Self {
        let config_path = dir.join("config.json");
        let data_dir = dir.join("data");
        let mount_point = dir.join("mnt");
        std::fs::create_dir_all(&data_dir).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let seed = json!({
            "data_dir": data_dir.display().to_string(),
            "mount_point": mount_point.display().to_string(),
            "web_port": port,
            "enable_fuse": false,
            "wireguard": {
                "interface_name": "jnk0",
                "wg_ip": interface_wg_ip,
                "endpoint": format!("127.0.0.1:{port}"),
                "listen_port": 51820,
            },
        });
        let mut f = std::fs::File::create(&config_path).unwrap();
        f.write_all(seed.to_string().as_bytes()).unwrap();
        drop(f);

        let store = ConfigStore::init(&config_path).unwrap();
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            Arc::new(junk_mesh::FixedPublicIp(None)),
            Arc::new(NullWireGuard::new()),
        ));

        let mut router = Router::new();
        support::register(&mut router, store.clone(), coordinator);
        let router = Arc::new(router);

        let stop = Arc::new(AtomicBool::new(false));
        let addr = format!("127.0.0.1:{port}");
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                let _ = junk_web::serve(listener, router, stop);
            })
        };
        // Give the accept loop a moment to enter its poll loop.
        std::thread::sleep(Duration::from_millis(50));

        Node { addr, store, stop, handle: Some(handle) }
    }

    fn get(&self, path: &str) -> Value {
        let resp = junk_web::request(&self.addr, "GET", path, &[], Duration::from_secs(2)).unwrap();
        assert_eq!(resp.status, 200, "GET {path} failed: {:?}", String::from_utf8_lossy(&resp.body));
        serde_json::from_slice(&resp.body).unwrap()
    }

    fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let resp = junk_web::post_json(&self.addr, path, body, Duration::from_secs(2)).unwrap();
        let parsed = serde_json::from_slice(&resp.body).unwrap_or(Value::Null);
        (resp.status, parsed)
    }

    fn public_key(&self) -> String {
        self.store.snapshot().wireguard.public_key
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[test]
fn bootstrap_mint_join_and_alternate_round_trip() {
    let dir_s = tempfile::tempdir().unwrap();
    let dir_c = tempfile::tempdir().unwrap();
    let server = Node::start(dir_s.path(), "10.99.0.1");
    let client = Node::start(dir_c.path(), "10.99.0.50");

    // Mint a join-config on the server.
    let (status, join) = server.post("/mesh/bootstrap", &Value::Null);
    assert_eq!(status, 200);
    let peer_wg_ip = join["peer_wg_ip"].as_str().unwrap();
    assert_ne!(peer_wg_ip, "10.99.0.1");
    assert!(!peer_wg_ip.is_empty());

    // A second mint must not reuse that address.
    let (_, join2) = server.post("/mesh/bootstrap", &Value::Null);
    assert_ne!(join2["peer_wg_ip"], join["peer_wg_ip"]);

    // The client adopts the join-config with alternate rotation enabled.
    let mut join_request = join.clone();
    join_request["allow_alternate"] = Value::Bool(true);
    let (status, _) = client.post("/mesh/join", &join_request);
    assert_eq!(status, 200);

    // The client's identity is no longer the one minted (alternate rotated it).
    let client_key_after_join = client.public_key();
    assert_ne!(client_key_after_join, join["peer_public_key"]);

    // The server must have recorded the rotated key against the same wg_ip.
    std::thread::sleep(Duration::from_millis(50));
    let server_state: Value = server.get("/mesh/peers");
    let peers = server_state["peers"].as_array().unwrap();
    let recorded = peers.iter().find(|p| p["wg_ip"] == peer_wg_ip).unwrap();
    assert_eq!(recorded["public_key"], client_key_after_join);

    // The client's own peer list names the server by its original identity.
    let client_cfg: Value = client.get("/mesh/config");
    assert_eq!(client_cfg["public_key"], client_key_after_join);
}

#[test]
fn merge_converges_disjoint_peer_sets() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = Node::start(dir_a.path(), "10.99.0.1");
    let b = Node::start(dir_b.path(), "10.99.0.2");

    a.store
        .upsert_peer(junk_config::Peer {
            public_key: "third-party-a".into(),
            wg_ip: "10.99.0.9".into(),
            endpoint: "203.0.113.1:9999".into(),
            ..Default::default()
        })
        .unwrap();
    b.store
        .upsert_peer(junk_config::Peer {
            public_key: "third-party-b".into(),
            wg_ip: "10.99.0.10".into(),
            endpoint: "203.0.113.2:9999".into(),
            ..Default::default()
        })
        .unwrap();

    let a_state: Value = a.get("/mesh/peers");
    let (status, _) = b.post("/mesh/peers", &a_state);
    assert_eq!(status, 200);
    let b_state: Value = b.get("/mesh/peers");
    let (status, _) = a.post("/mesh/peers", &b_state);
    assert_eq!(status, 200);

    let a_keys: Vec<String> = a
        .get("/mesh/peers")["peers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["public_key"].as_str().unwrap().to_string())
        .collect();
    let b_keys: Vec<String> = b
        .get("/mesh/peers")["peers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["public_key"].as_str().unwrap().to_string())
        .collect();

    // Each side now knows the other's third-party peer and the other's
    // own identity, but never lists itself among its own peers.
    assert!(a_keys.contains(&"third-party-b".to_string()));
    assert!(a_keys.contains(&b.public_key()));
    assert!(!a_keys.contains(&a.public_key()));

    assert!(b_keys.contains(&"third-party-a".to_string()));
    assert!(b_keys.contains(&a.public_key()));
    assert!(!b_keys.contains(&b.public_key()));
}

#[test]
fn status_reports_standalone_with_no_peers() {
    let dir = tempfile::tempdir().unwrap();
    let node = Node::start(dir.path(), "10.99.0.1");
    let status: Value = node.get("/mesh/status");
    assert_eq!(status["role"], "standalone");
    assert_eq!(status["standalone"], true);
    assert_eq!(status["active"], false);
}

#[test]
fn bootstrap_mint_is_forbidden_on_an_end_node() {
    let dir = tempfile::tempdir().unwrap();
    let node = Node::start(dir.path(), "10.99.0.1");
    node.store.set_node_state(NodeState::End).unwrap();
    let (status, _) = node.post("/mesh/bootstrap", &Value::Null);
    assert_eq!(status, 403);
}
