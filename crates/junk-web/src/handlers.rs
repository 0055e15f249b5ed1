//! Built-in route handlers: directory browsing, file streaming, and chunk
//! GET/POST.

use crate::safepath::parse_relative;
use crate::wire::{HttpRequest, HttpResponse};
use junk_chunkstore::ChunkStore;
use junk_manifest::Manifest;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `GET /` and `GET /browse/<rel>`.
pub fn browse_handler(
    data_root: Arc<PathBuf>,
) -> impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync {
    move |_req, rest| match parse_relative(rest) {
        Ok(rel) => browse(&data_root, &rel),
        Err(e) => HttpResponse::from_error(&e),
    }
}

fn browse(data_root: &Path, rel: &Path) -> HttpResponse {
    let dir = data_root.join(rel);
    let entries = match std::fs::read_dir(&dir) {
        Ok(rd) => rd,
        Err(_) => return HttpResponse::not_found(),
    };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if matches!(entry.file_type(), Ok(ft) if ft.is_dir()) {
            if let Some(s) = name.to_str() {
                if s != junk_fs::RESERVED_DIR {
                    dirs.push(s.to_string());
                }
            }
            continue;
        }
        if let Some(logical) = junk_fs::logical_name(&name) {
            let size = Manifest::read_file(&entry.path()).map(|m| m.size).unwrap_or(0);
            files.push((logical.to_string(), size));
        }
    }
    dirs.sort();
    files.sort();
    HttpResponse::html(200, render_listing(rel, &dirs, &files))
}

fn render_listing(rel: &Path, dirs: &[String], files: &[(String, u64)]) -> String {
    let base = rel.display().to_string();
    let mut out = String::from("<!doctype html><html><body>\n<ul>\n");
    for d in dirs {
        let child = if base.is_empty() { d.clone() } else { format!("{base}/{d}") };
        out.push_str(&format!("<li><a href=\"/browse/{child}\">{d}/</a></li>\n"));
    }
    for (name, size) in files {
        let child = if base.is_empty() { name.clone() } else { format!("{base}/{name}") };
        out.push_str(&format!(
            "<li><a href=\"/files/{child}\">{name}</a> ({size} bytes)</li>\n"
        ));
    }
    out.push_str("</ul>\n</body></html>\n");
    out
}

/// `GET /files/<rel>`: stream a file's materialized bytes by reading its
/// manifest and concatenating each chunk's verified content.
pub fn files_handler(
    data_root: Arc<PathBuf>,
    chunk_store: Arc<ChunkStore>,
) -> impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync {
    move |_req, rest| {
        let rel = match parse_relative(rest) {
            Ok(r) => r,
            Err(e) => return HttpResponse::from_error(&e),
        };
        let meta_path = junk_fs::meta_path(&data_root, &rel);
        let manifest = match Manifest::read_file(&meta_path) {
            Ok(m) => m,
            Err(_) => return HttpResponse::not_found(),
        };
        match materialize(&manifest, &chunk_store) {
            Ok(bytes) => HttpResponse::bytes(200, bytes),
            Err(e) => HttpResponse::from_error(&e),
        }
    }
}

fn materialize(manifest: &Manifest, store: &ChunkStore) -> junk_core::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(manifest.size as usize);
    let needed = manifest.needed_chunks() as usize;
    for idx in 0..needed {
        let remaining = manifest.size - (idx as u64) * junk_core::CHUNK_SIZE;
        let want = remaining.min(junk_core::CHUNK_SIZE) as usize;
        match manifest.get(idx) {
            Some(hash) => {
                let bytes = store.read_and_verify(hash)?;
                let n = bytes.len().min(want);
                out.extend_from_slice(&bytes[..n]);
                out.resize(out.len() + (want - n), 0);
            }
            None => out.resize(out.len() + want, 0),
        }
    }
    Ok(out)
}

fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `GET /chunks/<64-hex>`.
pub fn chunk_get_handler(
    store: Arc<ChunkStore>,
) -> impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync {
    move |_req, hash| {
        if !is_valid_hash(hash) {
            return HttpResponse::from_error(&junk_core::Error::InvalidArgument(
                "malformed chunk hash".into(),
            ));
        }
        match store.read_and_verify(hash) {
            Ok(bytes) => HttpResponse::bytes(200, bytes),
            Err(e) => HttpResponse::from_error(&e),
        }
    }
}

/// `POST /chunks/<64-hex>`: requires `Content-Length`, written via the same
/// put-if-absent path as the FUSE adapter's commit. Uploaded bytes are
/// trusted to match the path hash at write time; a mismatch only surfaces
/// later, at read time, via hash verification.
pub fn chunk_post_handler(
    store: Arc<ChunkStore>,
) -> impl Fn(&HttpRequest, &str) -> HttpResponse + Send + Sync {
    move |req, hash| {
        if !is_valid_hash(hash) {
            return HttpResponse::from_error(&junk_core::Error::InvalidArgument(
                "malformed chunk hash".into(),
            ));
        }
        if req.header("content-length").is_none() {
            return HttpResponse::from_error(&junk_core::Error::InvalidArgument(
                "missing content-length".into(),
            ));
        }
        match store.put_if_absent(hash, &req.body) {
            Ok(()) => HttpResponse::text(200, "OK"),
            Err(e) => HttpResponse::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junk_core::sha256_hex;

    fn req() -> HttpRequest {
        HttpRequest {
            method: "GET".into(),
            path: "/".into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn chunk_round_trips_through_post_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(vec![dir.path().join("root0")], None).unwrap());
        let data = b"chunk-bytes".to_vec();
        let hash = sha256_hex(&data);

        let mut upload = req();
        upload.method = "POST".into();
        upload.headers.push(("Content-Length".into(), data.len().to_string()));
        upload.body = data.clone();
        let post = chunk_post_handler(store.clone());
        let resp = post(&upload, &hash);
        assert_eq!(resp.status, 200);

        let get = chunk_get_handler(store);
        let resp = get(&req(), &hash);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, data);
    }

    #[test]
    fn chunk_post_without_content_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(vec![dir.path().join("root0")], None).unwrap());
        let hash = sha256_hex(b"x");
        let post = chunk_post_handler(store);
        let resp = post(&req(), &hash);
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(vec![dir.path().join("root0")], None).unwrap());
        let get = chunk_get_handler(store);
        let resp = get(&req(), "not-a-hash");
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn browse_lists_directories_and_logical_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir(root.join("sub")).unwrap();
        let m = Manifest { size: 11, hashes: vec![] };
        m.write_atomic(&root.join("hello.txt.__jnkmeta")).unwrap();

        let handler = browse_handler(Arc::new(root));
        let resp = handler(&req(), "");
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("sub/"));
        assert!(body.contains("hello.txt"));
        assert!(!body.contains(".__jnkmeta"));
        assert!(!body.contains(".jnk"));
    }

    #[test]
    fn files_handler_materializes_sparse_and_committed_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = Arc::new(ChunkStore::open(vec![dir.path().join("chunks")], None).unwrap());

        let tail = vec![7u8; 10];
        let mut padded = vec![0u8; junk_core::CHUNK_SIZE as usize];
        padded[..tail.len()].copy_from_slice(&tail);
        let hash = sha256_hex(&padded);
        store.put_if_absent(&hash, &padded).unwrap();

        let mut m = Manifest {
            size: junk_core::CHUNK_SIZE + 10,
            hashes: vec![],
        };
        m.set(1, Some(hash));
        m.write_atomic(&root.join("f.__jnkmeta")).unwrap();

        let handler = files_handler(Arc::new(root), store);
        let resp = handler(&req(), "f");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.len(), (junk_core::CHUNK_SIZE + 10) as usize);
        assert!(resp.body[..junk_core::CHUNK_SIZE as usize].iter().all(|&b| b == 0));
        assert_eq!(&resp.body[junk_core::CHUNK_SIZE as usize..], &tail[..]);
    }
}
