//! The per-file manifest: the only durable per-file metadata.
//!
//! Text format:
//! ```text
//! size <decimal>
//! chunk <idx> <64-hex>
//! ...
//! ```
//! Only lines matching exactly these two shapes are parsed; any other line
//! is skipped. The size header must be the first line and must parse, or
//! the whole manifest is `corrupt-manifest`.

use junk_core::{chunks_needed, Error, Result};
use std::fs;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;

/// In-memory manifest: the file's logical size plus a sparse chunk index.
/// `hashes[i] = None` means that window is entirely zero (sparse).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub size: u64,
    pub hashes: Vec<Option<String>>,
}

impl Manifest {
    pub fn empty() -> Self {
        Manifest {
            size: 0,
            hashes: Vec::new(),
        }
    }

    /// Number of 1 MiB windows this file's `size` implies.
    pub fn needed_chunks(&self) -> u64 {
        chunks_needed(self.size)
    }

    /// All present (non-sparse) hashes, in index order, with duplicates —
    /// the multiset the refcount diff operates over.
    pub fn hash_multiset(&self) -> Vec<String> {
        self.hashes.iter().flatten().cloned().collect()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.hashes.get(idx).and_then(|h| h.as_deref())
    }

    pub fn set(&mut self, idx: usize, hash: Option<String>) {
        if idx >= self.hashes.len() {
            self.hashes.resize(idx + 1, None);
        }
        self.hashes[idx] = hash;
    }

    /// Shrink the hash list so no index `>= needed` remains (truncate path).
    pub fn truncate_to_needed(&mut self) {
        let needed = self.needed_chunks() as usize;
        if self.hashes.len() > needed {
            self.hashes.truncate(needed);
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = format!("size {}\n", self.size);
        for (idx, hash) in self.hashes.iter().enumerate() {
            if let Some(hash) = hash {
                out.push_str(&format!("chunk {idx} {hash}\n"));
            }
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let first = lines
            .next()
            .ok_or_else(|| Error::CorruptManifest("empty manifest".into()))?;
        let size = parse_size_line(first)
            .ok_or_else(|| Error::CorruptManifest(format!("unparseable size header: {first:?}")))?;

        let mut manifest = Manifest {
            size,
            hashes: Vec::new(),
        };
        for line in lines {
            if let Some((idx, hash)) = parse_chunk_line(line) {
                manifest.set(idx, Some(hash));
            }
            // Any other shape (including a stray second "size" line) is
            // malformed and silently skipped.
        }
        Ok(manifest)
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Write path: materialize to `<name>.tmp`, fsync, rename.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::InvalidArgument("manifest path has no parent".into()))?;
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(self.serialize().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn parse_size_line(line: &str) -> Option<u64> {
    let rest = line.strip_prefix("size ")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

fn parse_chunk_line(line: &str) -> Option<(usize, String)> {
    let rest = line.strip_prefix("chunk ")?;
    let mut parts = rest.splitn(2, ' ');
    let idx_str = parts.next()?;
    let hash = parts.next()?;
    if idx_str.is_empty() || !idx_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let idx: usize = idx_str.parse().ok()?;
    Some((idx, hash.to_ascii_lowercase()))
}
