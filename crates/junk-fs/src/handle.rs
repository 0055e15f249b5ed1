//! Per-open-file state: staged
//! dirty chunks plus the original snapshot used for the release-time
//! refcount diff.

use junk_chunkstore::ChunkStore;
use junk_core::{sha256_hex, Error, Result, CHUNK_SIZE};
use junk_manifest::Manifest;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct OpenHandle {
    pub rel_path: PathBuf,
    pub manifest: Manifest,
    /// The hash multiset captured at `open`/`create`, diffed against the
    /// post-release multiset to drive refcount updates.
    pub orig_hashes: Vec<String>,
    /// Dirty 1 MiB chunk buffers, keyed by chunk index. Always exactly
    /// `CHUNK_SIZE` bytes (zero-padded past the file's logical end).
    pub dirty: HashMap<usize, Vec<u8>>,
}

impl OpenHandle {
    pub fn for_new_file(rel_path: PathBuf) -> Self {
        OpenHandle {
            rel_path,
            manifest: Manifest::empty(),
            orig_hashes: Vec::new(),
            dirty: HashMap::new(),
        }
    }

    pub fn opened(rel_path: PathBuf, manifest: Manifest) -> Self {
        let orig_hashes = manifest.hash_multiset();
        OpenHandle {
            rel_path,
            manifest,
            orig_hashes,
            dirty: HashMap::new(),
        }
    }

    /// Full 1 MiB contents of chunk `idx`: the dirty buffer if staged, else
    /// loaded (and integrity-verified) from the chunk store, else zeros.
    pub fn load_chunk(&self, store: &ChunkStore, idx: usize) -> Result<Vec<u8>> {
        if let Some(buf) = self.dirty.get(&idx) {
            return Ok(buf.clone());
        }
        let mut buf = vec![0u8; CHUNK_SIZE as usize];
        if let Some(hash) = self.manifest.get(idx) {
            let bytes = store.read_and_verify(hash)?;
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(buf)
    }

    /// Obtain the dirty buffer for `idx`, first-touch-loading its existing
    /// contents via the read path, or zero-filling if the index is sparse.
    pub fn dirty_chunk_mut(&mut self, store: &ChunkStore, idx: usize) -> Result<&mut Vec<u8>> {
        if !self.dirty.contains_key(&idx) {
            let buf = self.load_chunk(store, idx)?;
            self.dirty.insert(idx, buf);
        }
        Ok(self.dirty.get_mut(&idx).expect("just inserted"))
    }

    /// Shrink path of `truncate`: drop dirty buffers and hash entries at or
    /// beyond the chunk count the new size implies.
    pub fn shrink_to(&mut self, new_size: u64) {
        self.manifest.size = new_size;
        let needed = self.manifest.needed_chunks() as usize;
        self.dirty.retain(|&idx, _| idx < needed);
        self.manifest.truncate_to_needed();
    }

    pub fn grow_to(&mut self, new_size: u64) {
        self.manifest.size = new_size;
    }

    /// Commit every dirty chunk to the store and fold its hash into the
    /// manifest. Called at `release`, before the manifest is rewritten.
    pub fn commit_dirty_chunks(&mut self, store: &ChunkStore) -> Result<()> {
        for (&idx, buf) in self.dirty.iter() {
            let hash = sha256_hex(buf);
            store.put_if_absent(&hash, buf)?;
            self.manifest.set(idx, Some(hash));
        }
        self.manifest.truncate_to_needed();
        Ok(())
    }
}

pub fn chunk_range(offset: u64, len: u64) -> std::ops::Range<usize> {
    if len == 0 {
        return 0..0;
    }
    let start = (offset / CHUNK_SIZE) as usize;
    let end = ((offset + len - 1) / CHUNK_SIZE) as usize + 1;
    start..end
}

pub fn validate_non_negative_offset(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| Error::InvalidArgument("negative offset".into()))
}
