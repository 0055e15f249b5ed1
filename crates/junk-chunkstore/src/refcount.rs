//! Per-chunk refcount index: one file per live chunk, locked for
//! concurrent mutation, driving chunk deletion via the multiset-diff
//! protocol.

use crate::layout::{ref_path, refs_shard_dir};
use crate::store::ChunkStore;
use fs2::FileExt;
use junk_core::Result;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Mutate the refcount of `hash` by `delta`.
///
/// Absence is unknown, not zero: a negative delta against a file that did
/// not exist before this call is silently discarded (the freshly created
/// file is removed again) rather than treated as "now at -1".
pub fn adjust(store: &ChunkStore, hash: &str, delta: i64) -> Result<()> {
    let primary = store.primary();
    let dir = refs_shard_dir(primary, hash);
    fs::create_dir_all(&dir)?;
    let path = ref_path(primary, hash);

    let existed_before = path.is_file();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)?;
    file.lock_exclusive()?;

    let current = read_count(&mut file)?;

    if delta < 0 && !existed_before {
        file.unlock()?;
        drop(file);
        let _ = fs::remove_file(&path);
        debug!(hash, "refcount decrement against absent record discarded");
        return Ok(());
    }

    let next = (current as i64 + delta).max(0) as u64;

    if next == 0 {
        file.unlock()?;
        drop(file);
        fs::remove_file(&path)?;
        store.delete_everywhere(hash)?;
        debug!(hash, "refcount reached zero, chunk deleted");
    } else {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(next.to_string().as_bytes())?;
        file.sync_all()?;
        file.unlock()?;
    }
    Ok(())
}

fn read_count(file: &mut std::fs::File) -> Result<u64> {
    let mut buf = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut buf)?;
    Ok(buf.trim().parse().unwrap_or(0))
}

/// Read the current refcount for `hash`, treating an absent/corrupt file as
/// `0` ("unknown", never negative).
pub fn current(primary: &Path, hash: &str) -> u64 {
    let path = ref_path(primary, hash);
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// Apply the multiset diff between the original and new hash lists (spec
/// §4.3 "Multiset diff protocol"): sort both, walk in parallel, apply one
/// combined delta per distinct hash. O(|orig| + |new|).
pub fn apply_multiset_diff(
    store: &ChunkStore,
    orig_hashes: &[String],
    new_hashes: &[String],
) -> Result<()> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for h in orig_hashes {
        *counts.entry(h.as_str()).or_insert(0) -= 1;
    }
    for h in new_hashes {
        *counts.entry(h.as_str()).or_insert(0) += 1;
    }
    for (hash, delta) in counts {
        if delta != 0 {
            adjust(store, hash, delta)?;
        }
    }
    Ok(())
}
