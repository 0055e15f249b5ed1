//! Process supervisor: brings the filesystem, mesh coordinator, and web
//! service up and down in a fixed order, and owns the signal-driven
//! shutdown path.
//!
//! Startup order is filesystem mount, then mesh, then web (the web
//! service's browse/files/chunk routes read the same backing store the
//! mount exposes, so the mount must exist first; the mesh coordinator has
//! no dependency on either and is started next so its first sync cycle can
//! already see a listening web service). Shutdown reverses the order.

use crate::routes;
use anyhow::{Context, Result};
use junk_chunkstore::ChunkStore;
use junk_config::ConfigStore;
use junk_mesh::{Coordinator, HttpPublicIpProbe, ShellWireGuard, StopSignal};
use junk_web::Router;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PUBLIC_IP_PROBE_ADDR: &str = "checkip.amazonaws.com:80";
const PUBLIC_IP_PROBE_PATH: &str = "/";
const PUBLIC_IP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the node until a shutdown signal arrives. Blocks the calling
/// (main) thread for the lifetime of the process.
pub fn run(store: ConfigStore) -> Result<()> {
    let cfg = store.snapshot();

    let data_dirs: Vec<PathBuf> = cfg.effective_data_dirs().into_iter().map(PathBuf::from).collect();
    let quota = if cfg.storage_size.is_empty() {
        None
    } else {
        junk_sizefmt::parse_size(&cfg.storage_size)
    };
    let chunk_store = Arc::new(ChunkStore::open(data_dirs.clone(), quota).context("opening chunk store")?);

    let primary_root = data_dirs
        .first()
        .cloned()
        .context("no primary data directory configured")?;

    let _fuse_session = if cfg.enable_fuse {
        info!(mount = %cfg.mount_point, "mounting filesystem");
        let fs = junk_fs::JunkFs::new(primary_root.clone(), chunk_store.clone(), quota);
        std::fs::create_dir_all(&cfg.mount_point).context("creating mount point")?;
        Some(junk_fs::spawn(fs, std::path::Path::new(&cfg.mount_point)).context("mounting FUSE filesystem")?)
    } else {
        info!("enable_fuse=false, skipping mount");
        None
    };

    let mesh_stop = StopSignal::new();
    let public_ip_probe = Arc::new(HttpPublicIpProbe::new(
        PUBLIC_IP_PROBE_ADDR,
        PUBLIC_IP_PROBE_PATH,
        PUBLIC_IP_PROBE_TIMEOUT,
    ));
    let coordinator = Arc::new(Coordinator::new(store.clone(), public_ip_probe, Arc::new(ShellWireGuard)));
    let mesh_handle = {
        let coordinator = coordinator.clone();
        let stop = mesh_stop.clone();
        info!("starting mesh coordinator");
        std::thread::spawn(move || coordinator.run(&stop))
    };

    let mut router = Router::new();
    {
        let data_root = Arc::new(primary_root.clone());
        router.get("/", junk_web::browse_handler(data_root.clone()));
        router.get_prefix("/browse/", junk_web::browse_handler(data_root.clone()));
        router.get_prefix("/files/", junk_web::files_handler(data_root, chunk_store.clone()));
        router.get_prefix("/chunks/", junk_web::chunk_get_handler(chunk_store.clone()));
        router.post_prefix("/chunks/", junk_web::chunk_post_handler(chunk_store.clone()));
    }
    routes::register(&mut router, store.clone(), coordinator.clone());
    let router = Arc::new(router);

    let listener = TcpListener::bind(("0.0.0.0", cfg.web_port))
        .with_context(|| format!("binding web service to port {}", cfg.web_port))?;
    let web_stop = Arc::new(AtomicBool::new(false));
    let web_handle = {
        let router = router.clone();
        let web_stop = web_stop.clone();
        info!(port = cfg.web_port, "starting web service");
        std::thread::spawn(move || junk_web::serve(listener, router, web_stop))
    };

    wait_for_shutdown_signal()?;
    info!("shutdown requested, stopping services");

    web_stop.store(true, Ordering::Relaxed);
    match web_handle.join() {
        Ok(Err(e)) => warn!(error = %e, "web service accept loop exited with an error"),
        Err(e) => warn!(?e, "web service thread panicked"),
        Ok(Ok(())) => {}
    }

    mesh_stop.stop();
    if let Err(e) = mesh_handle.join() {
        warn!(?e, "mesh coordinator thread panicked");
    }

    // `_fuse_session` drops here, unmounting the filesystem last.
    info!("shutdown complete");
    Ok(())
}

/// Block until `SIGINT`/`SIGTERM` (via `ctrlc`, which installs handlers for
/// both), polling a flag once a second rather than parking forever so the
/// same cadence as the mesh loop's shutdown poll applies here too.
fn wait_for_shutdown_signal() -> Result<()> {
    let requested = Arc::new(AtomicBool::new(false));
    {
        let requested = requested.clone();
        ctrlc::set_handler(move || requested.store(true, Ordering::Relaxed))
            .context("installing signal handler")?;
    }
    while !requested.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
    }
    Ok(())
}
