//! Inode table: bidirectional mapping between FUSE inode numbers and
//! relative paths under the backing root. The mount root is always inode 1.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ROOT_INO: u64 = 1;

#[derive(Default)]
pub struct InodeTable {
    by_ino: HashMap<u64, PathBuf>,
    by_path: HashMap<PathBuf, u64>,
    next: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut by_ino = HashMap::new();
        let mut by_path = HashMap::new();
        by_ino.insert(ROOT_INO, PathBuf::new());
        by_path.insert(PathBuf::new(), ROOT_INO);
        InodeTable {
            by_ino,
            by_path,
            next: ROOT_INO + 1,
        }
    }

    pub fn path_of(&self, ino: u64) -> Option<PathBuf> {
        self.by_ino.get(&ino).cloned()
    }

    /// Return the existing inode for `rel`, allocating a fresh one if this
    /// is the first time it has been looked up.
    pub fn intern(&mut self, rel: &Path) -> u64 {
        if let Some(&ino) = self.by_path.get(rel) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_ino.insert(ino, rel.to_path_buf());
        self.by_path.insert(rel.to_path_buf(), ino);
        ino
    }

    /// Re-point every inode rooted at `old` (inclusive) to the same relative
    /// position under `new`, following a rename.
    pub fn rename(&mut self, old: &Path, new: &Path) {
        let affected: Vec<PathBuf> = self
            .by_path
            .keys()
            .filter(|p| *p == old || p.starts_with(old))
            .cloned()
            .collect();
        for path in affected {
            if let Some(ino) = self.by_path.remove(&path) {
                let rest = path.strip_prefix(old).unwrap_or(Path::new(""));
                let remapped = if rest.as_os_str().is_empty() {
                    new.to_path_buf()
                } else {
                    new.join(rest)
                };
                self.by_ino.insert(ino, remapped.clone());
                self.by_path.insert(remapped, ino);
            }
        }
    }

    pub fn forget(&mut self, rel: &Path) {
        if let Some(ino) = self.by_path.remove(rel) {
            self.by_ino.remove(&ino);
        }
    }
}
