//! Content-addressed chunk store: round-robin across backing roots,
//! quota-checked put-if-absent, integrity-verified reads.

use crate::layout::{chunk_path, chunks_shard_dir, chunks_sha256_root};
use junk_core::{sha256_hex, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub struct ChunkStore {
    roots: Vec<PathBuf>,
    quota: Option<u64>,
    rr_next: AtomicUsize,
    usage: AtomicU64,
}

impl ChunkStore {
    /// Construct a chunk store over `roots` (first is the primary),
    /// creating the shard directory skeleton and revalidating usage from
    /// disk on every open rather than trusting a cached value.
    pub fn open(roots: Vec<PathBuf>, quota: Option<u64>) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::InvalidArgument("no backing roots configured".into()));
        }
        for root in &roots {
            fs::create_dir_all(chunks_sha256_root(root))?;
        }
        let usage = compute_usage(&roots)?;
        Ok(Self {
            roots,
            quota,
            rr_next: AtomicUsize::new(0),
            usage: AtomicU64::new(usage),
        })
    }

    pub fn primary(&self) -> &Path {
        &self.roots[0]
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn recompute_usage(&self) -> Result<u64> {
        let usage = compute_usage(&self.roots)?;
        self.usage.store(usage, Ordering::Relaxed);
        Ok(usage)
    }

    /// Locate `hash` across all backing roots, without reading it.
    pub fn locate(&self, hash: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| chunk_path(root, hash))
            .find(|p| p.is_file())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.locate(hash).is_some()
    }

    /// `put_if_absent(hash, bytes)`: search every backing root; if present,
    /// return success. Otherwise quota-check, pick `rr_next % N`, stage via
    /// temp+fsync+rename, never overwrite.
    pub fn put_if_absent(&self, hash: &str, bytes: &[u8]) -> Result<()> {
        if self.contains(hash) {
            return Ok(());
        }
        if let Some(quota) = self.quota {
            if self.usage.load(Ordering::Relaxed) + bytes.len() as u64 > quota {
                return Err(Error::OutOfSpace);
            }
        }
        let idx = self.rr_next.fetch_add(1, Ordering::Relaxed) % self.roots.len();
        let root = &self.roots[idx];
        let dir = chunks_shard_dir(root, hash);
        fs::create_dir_all(&dir)?;
        let target = dir.join(hash);

        let mut tmp = NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut tmp, bytes)?;
        tmp.as_file().sync_all()?;

        match tmp.persist(&target) {
            Ok(_) => {
                self.usage.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                debug!(hash, root = %root.display(), "committed new chunk");
                Ok(())
            }
            Err(e) => {
                // Benign race: another thread/process won the rename first.
                if target.is_file() {
                    Ok(())
                } else {
                    Err(Error::Io(e.error))
                }
            }
        }
    }

    /// `read_and_verify(hash, buf)`: search roots, open, read whole file
    /// (≤1 MiB), recompute SHA-256, mismatch/short read → integrity fault.
    pub fn read_and_verify(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self
            .locate(hash)
            .ok_or_else(|| Error::NotFound(format!("chunk {hash}")))?;
        let bytes = fs::read(&path)?;
        let actual = sha256_hex(&bytes);
        if actual != hash {
            warn!(expected = hash, actual = %actual, path = %path.display(), "chunk integrity mismatch");
            return Err(Error::IntegrityFault(format!(
                "chunk {hash} hashes to {actual}"
            )));
        }
        Ok(bytes)
    }

    /// Unlink `hash` from every backing root (used once its refcount hits
    /// zero).
    pub fn delete_everywhere(&self, hash: &str) -> Result<()> {
        for root in &self.roots {
            let path = chunk_path(root, hash);
            if let Ok(meta) = fs::metadata(&path) {
                let len = meta.len();
                fs::remove_file(&path)?;
                self.usage.fetch_sub(len, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

fn compute_usage(roots: &[PathBuf]) -> Result<u64> {
    let mut total = 0u64;
    for root in roots {
        let sha_root = chunks_sha256_root(root);
        if !sha_root.is_dir() {
            continue;
        }
        for shard in fs::read_dir(&sha_root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    total += entry.metadata()?.len();
                }
            }
        }
    }
    Ok(total)
}
