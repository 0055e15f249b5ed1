//! On-disk layout: `<root>/.jnk/chunks/sha256/<aa>/<hash>` and
//! `<primary>/.jnk/refs/<aa>/<hash>.ref`.

use junk_core::shard_prefix;
use std::path::{Path, PathBuf};

pub fn chunks_shard_dir(root: &Path, hash: &str) -> PathBuf {
    root.join(".jnk")
        .join("chunks")
        .join("sha256")
        .join(shard_prefix(hash))
}

pub fn chunk_path(root: &Path, hash: &str) -> PathBuf {
    chunks_shard_dir(root, hash).join(hash)
}

pub fn chunks_sha256_root(root: &Path) -> PathBuf {
    root.join(".jnk").join("chunks").join("sha256")
}

pub fn refs_shard_dir(primary: &Path, hash: &str) -> PathBuf {
    primary.join(".jnk").join("refs").join(shard_prefix(hash))
}

pub fn ref_path(primary: &Path, hash: &str) -> PathBuf {
    refs_shard_dir(primary, hash).join(format!("{hash}.ref"))
}
