//! The FUSE adapter: a POSIX-subset view over the primary
//! backing directory, chunk-backed regular files, real passthrough
//! directories.

use crate::handle::{chunk_range, validate_non_negative_offset, OpenHandle};
use crate::inode::{InodeTable, ROOT_INO};
use crate::path::{logical_name, meta_path, validate_component};
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use junk_chunkstore::{apply_multiset_diff, ChunkStore};
use junk_core::{sha256_hex, Error, CHUNK_SIZE};
use junk_manifest::Manifest;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::warn;

const TTL: Duration = Duration::from_secs(1);

fn errno(e: &Error) -> i32 {
    e.to_errno().as_raw()
}

pub struct JunkFs {
    primary_root: PathBuf,
    chunk_store: Arc<ChunkStore>,
    quota: Option<u64>,
    inodes: InodeTable,
    handles: HashMap<u64, OpenHandle>,
    next_fh: AtomicU64,
}

impl JunkFs {
    pub fn new(primary_root: PathBuf, chunk_store: Arc<ChunkStore>, quota: Option<u64>) -> Self {
        let _ = fs::create_dir_all(&primary_root);
        JunkFs {
            primary_root,
            chunk_store,
            quota,
            inodes: InodeTable::new(),
            handles: HashMap::new(),
            next_fh: AtomicU64::new(1),
        }
    }

    fn backing(&self, rel: &Path) -> PathBuf {
        self.primary_root.join(rel)
    }

    fn meta(&self, rel: &Path) -> PathBuf {
        meta_path(&self.primary_root, rel)
    }

    fn alloc_fh(&self) -> u64 {
        self.next_fh.fetch_add(1, Ordering::Relaxed)
    }

    fn child_rel(&self, parent: u64, name: &OsStr) -> Result<PathBuf, Error> {
        let name = validate_component(name)?;
        let parent_rel = self
            .inodes
            .path_of(parent)
            .ok_or_else(|| Error::NotFound(format!("inode {parent}")))?;
        Ok(parent_rel.join(name))
    }

    fn dir_attr(&self, ino: u64, rel: &Path, req: &Request<'_>) -> Option<FileAttr> {
        let meta = fs::metadata(self.backing(rel)).ok()?;
        let now = SystemTime::now();
        Some(FileAttr {
            ino,
            size: 0,
            blocks: 0,
            atime: meta.accessed().unwrap_or(now),
            mtime: meta.modified().unwrap_or(now),
            ctime: meta.modified().unwrap_or(now),
            crtime: meta.created().unwrap_or(now),
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: CHUNK_SIZE as u32,
            flags: 0,
        })
    }

    fn file_attr(&self, ino: u64, rel: &Path, size: u64, req: &Request<'_>) -> FileAttr {
        let meta = fs::metadata(self.meta(rel)).ok();
        let now = SystemTime::now();
        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: meta.as_ref().and_then(|m| m.accessed().ok()).unwrap_or(now),
            mtime: meta.as_ref().and_then(|m| m.modified().ok()).unwrap_or(now),
            ctime: meta.as_ref().and_then(|m| m.modified().ok()).unwrap_or(now),
            crtime: meta.as_ref().and_then(|m| m.created().ok()).unwrap_or(now),
            kind: FileType::RegularFile,
            perm: 0o644,
            nlink: 1,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: CHUNK_SIZE as u32,
            flags: 0,
        }
    }

    /// Look up an existing backing entry (directory or manifest) at `rel`.
    fn stat_entry(&self, rel: &Path) -> Option<bool> {
        if self.backing(rel).is_dir() {
            Some(true)
        } else if self.meta(rel).is_file() {
            Some(false)
        } else {
            None
        }
    }

    /// Locate the live open handle for `ino`, preferring `fh` when given
    /// requires an open handle.
    fn handle_for(&mut self, ino: u64, fh: Option<u64>) -> Option<u64> {
        if let Some(fh) = fh {
            if self.handles.contains_key(&fh) {
                return Some(fh);
            }
        }
        let rel = self.inodes.path_of(ino)?;
        self.handles
            .iter()
            .find(|(_, h)| h.rel_path == rel)
            .map(|(&fh, _)| fh)
    }
}

impl Filesystem for JunkFs {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        match self.stat_entry(&rel) {
            Some(true) => {
                let ino = self.inodes.intern(&rel);
                match self.dir_attr(ino, &rel, req) {
                    Some(attr) => reply.entry(&TTL, &attr, 0),
                    None => reply.error(libc::ENOENT),
                }
            }
            Some(false) => {
                let ino = self.inodes.intern(&rel);
                let manifest = Manifest::read_file(&self.meta(&rel)).unwrap_or_default();
                let attr = self.file_attr(ino, &rel, manifest.size, req);
                reply.entry(&TTL, &attr, 0);
            }
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let rel = match self.inodes.path_of(ino) {
            Some(r) => r,
            None => return reply.error(libc::ENOENT),
        };
        if ino == ROOT_INO || self.backing(&rel).is_dir() {
            match self.dir_attr(ino, &rel, req) {
                Some(attr) => reply.attr(&TTL, &attr),
                None => reply.error(libc::ENOENT),
            }
            return;
        }
        match Manifest::read_file(&self.meta(&rel)) {
            Ok(m) => reply.attr(&TTL, &self.file_attr(ino, &rel, m.size, req)),
            Err(_) => reply.error(libc::ENOENT),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // chmod/chown are deliberately disabled; silently
        // ignored rather than rejected so ordinary tools (`touch`, `cp -p`)
        // don't hard-fail.
        let rel = match self.inodes.path_of(ino) {
            Some(r) => r,
            None => return reply.error(libc::ENOENT),
        };

        let Some(new_size) = size else {
            if self.backing(&rel).is_dir() {
                match self.dir_attr(ino, &rel, req) {
                    Some(attr) => reply.attr(&TTL, &attr),
                    None => reply.error(libc::ENOENT),
                }
            } else {
                match Manifest::read_file(&self.meta(&rel)) {
                    Ok(m) => reply.attr(&TTL, &self.file_attr(ino, &rel, m.size, req)),
                    Err(_) => reply.error(libc::ENOENT),
                }
            }
            return;
        };

        let Some(fh) = self.handle_for(ino, fh) else {
            return reply.error(libc::EINVAL);
        };
        let handle = self.handles.get_mut(&fh).expect("handle_for returned a live fh");
        let needed_before = handle.manifest.needed_chunks();
        let needed_after = new_size.div_ceil(CHUNK_SIZE);
        if needed_after < needed_before {
            handle.shrink_to(new_size);
        } else {
            handle.grow_to(new_size);
        }
        let size = handle.manifest.size;
        reply.attr(&TTL, &self.file_attr(ino, &rel, size, req));
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        if self.backing(&rel).is_dir() {
            return reply.error(libc::EISDIR);
        }
        let meta_path = self.meta(&rel);
        if let Err(e) = Manifest::empty().write_atomic(&meta_path) {
            warn!(error = %e, path = %rel.display(), "failed to create manifest");
            return reply.error(errno(&e));
        }
        let ino = self.inodes.intern(&rel);
        let fh = self.alloc_fh();
        self.handles.insert(fh, OpenHandle::for_new_file(rel.clone()));
        let attr = self.file_attr(ino, &rel, 0, req);
        reply.created(&TTL, &attr, 0, fh, flags as u32);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let rel = match self.inodes.path_of(ino) {
            Some(r) => r,
            None => return reply.error(libc::ENOENT),
        };
        match Manifest::read_file(&self.meta(&rel)) {
            Ok(manifest) => {
                let fh = self.alloc_fh();
                self.handles.insert(fh, OpenHandle::opened(rel, manifest));
                let _ = flags;
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let offset = match validate_non_negative_offset(offset) {
            Ok(o) => o,
            Err(e) => return reply.error(errno(&e)),
        };
        let handle = match self.handles.get(&fh) {
            Some(h) => h,
            None => return reply.error(libc::ENOENT),
        };
        if offset >= handle.manifest.size {
            return reply.data(&[]);
        }
        let want_end = (offset + size as u64).min(handle.manifest.size);
        let mut out = Vec::with_capacity((want_end - offset) as usize);
        for idx in chunk_range(offset, want_end - offset) {
            let buf = match handle.load_chunk(&self.chunk_store, idx) {
                Ok(b) => b,
                Err(e) => return reply.error(errno(&e)),
            };
            let chunk_start = idx as u64 * CHUNK_SIZE;
            let lo = offset.max(chunk_start) - chunk_start;
            let hi = want_end.min(chunk_start + CHUNK_SIZE) - chunk_start;
            out.extend_from_slice(&buf[lo as usize..hi as usize]);
        }
        reply.data(&out);
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let offset = match validate_non_negative_offset(offset) {
            Ok(o) => o,
            Err(e) => return reply.error(errno(&e)),
        };
        let handle = match self.handles.get_mut(&fh) {
            Some(h) => h,
            None => return reply.error(libc::ENOENT),
        };
        for idx in chunk_range(offset, data.len() as u64) {
            let chunk_start = idx as u64 * CHUNK_SIZE;
            let ov_start = offset.max(chunk_start);
            let ov_end = (offset + data.len() as u64).min(chunk_start + CHUNK_SIZE);
            let lo = (ov_start - chunk_start) as usize;
            let n = (ov_end - ov_start) as usize;
            let src_start = (ov_start - offset) as usize;
            let buf = match handle.dirty_chunk_mut(&self.chunk_store, idx) {
                Ok(b) => b,
                Err(e) => return reply.error(errno(&e)),
            };
            buf[lo..lo + n].copy_from_slice(&data[src_start..src_start + n]);
        }
        let new_end = offset + data.len() as u64;
        if new_end > handle.manifest.size {
            handle.manifest.size = new_end;
        }
        reply.written(data.len() as u32);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let Some(mut handle) = self.handles.remove(&fh) else {
            return reply.ok();
        };
        if let Err(e) = handle.commit_dirty_chunks(&self.chunk_store) {
            warn!(error = %e, path = %handle.rel_path.display(), "failed to commit dirty chunks");
            return reply.ok();
        }
        let meta_path = self.meta(&handle.rel_path);
        match handle.manifest.write_atomic(&meta_path) {
            Ok(()) => {
                let new_hashes = handle.manifest.hash_multiset();
                if let Err(e) =
                    apply_multiset_diff(&self.chunk_store, &handle.orig_hashes, &new_hashes)
                {
                    warn!(error = %e, path = %handle.rel_path.display(), "refcount diff failed on release");
                }
            }
            Err(e) => {
                warn!(error = %e, path = %handle.rel_path.display(), "manifest rewrite failed, refcount update skipped");
            }
        }
        reply.ok();
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        let meta_path = self.meta(&rel);
        let manifest = match Manifest::read_file(&meta_path) {
            Ok(m) => m,
            Err(_) => return reply.error(libc::ENOENT),
        };
        if let Err(e) = apply_multiset_diff(&self.chunk_store, &manifest.hash_multiset(), &[]) {
            warn!(error = %e, path = %rel.display(), "refcount diff failed on unlink");
        }
        if let Err(e) = fs::remove_file(&meta_path) {
            return reply.error(e.raw_os_error().unwrap_or(libc::EIO));
        }
        self.inodes.forget(&rel);
        reply.ok();
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        if let Err(e) = fs::create_dir(self.backing(&rel)) {
            return reply.error(e.raw_os_error().unwrap_or(libc::EIO));
        }
        let ino = self.inodes.intern(&rel);
        match self.dir_attr(ino, &rel, req) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::EIO),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        match fs::remove_dir(self.backing(&rel)) {
            Ok(()) => {
                self.inodes.forget(&rel);
                reply.ok();
            }
            Err(e) => reply.error(e.raw_os_error().unwrap_or(libc::EIO)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let old_rel = match self.child_rel(parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };
        let new_rel = match self.child_rel(newparent, newname) {
            Ok(v) => v,
            Err(e) => return reply.error(errno(&e)),
        };

        let is_dir = self.backing(&old_rel).is_dir();
        let result = if is_dir {
            fs::rename(self.backing(&old_rel), self.backing(&new_rel))
        } else {
            fs::rename(self.meta(&old_rel), self.meta(&new_rel))
        };
        match result {
            Ok(()) => {
                self.inodes.rename(&old_rel, &new_rel);
                reply.ok();
            }
            Err(e) => reply.error(e.raw_os_error().unwrap_or(libc::EIO)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let rel = match self.inodes.path_of(ino) {
            Some(r) => r,
            None => return reply.error(libc::ENOENT),
        };
        let dir = self.backing(&rel);
        let mut entries: Vec<(String, FileType)> = vec![
            (".".to_string(), FileType::Directory),
            ("..".to_string(), FileType::Directory),
        ];
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => return reply.error(e.raw_os_error().unwrap_or(libc::EIO)),
        };
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            if let Ok(ft) = entry.file_type() {
                if ft.is_dir() {
                    if let Some(s) = name.to_str() {
                        if s != crate::path::RESERVED_DIR {
                            entries.push((s.to_string(), FileType::Directory));
                        }
                    }
                    continue;
                }
            }
            if let Some(logical) = logical_name(&name) {
                entries.push((logical.to_string(), FileType::RegularFile));
            }
        }
        for (i, (name, kind)) in entries.into_iter().enumerate().skip(offset as usize) {
            let child_ino = if name == "." {
                ino
            } else if name == ".." {
                self.inodes
                    .path_of(ino)
                    .and_then(|r| r.parent().map(|p| p.to_path_buf()))
                    .map(|p| self.inodes.intern(&p))
                    .unwrap_or(ROOT_INO)
            } else {
                self.inodes.intern(&rel.join(&name))
            };
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let bsize = CHUNK_SIZE as u32;
        let (blocks, bfree) = match self.quota {
            Some(quota) => {
                let used = self.chunk_store.usage();
                let free = quota.saturating_sub(used);
                (quota / CHUNK_SIZE, free / CHUNK_SIZE)
            }
            None => {
                let total = fs2::total_space(&self.primary_root).unwrap_or(0);
                let free = fs2::available_space(&self.primary_root).unwrap_or(0);
                (total / CHUNK_SIZE, free / CHUNK_SIZE)
            }
        };
        reply.statfs(blocks, bfree, bfree, 0, 0, bsize, 255, bsize);
    }
}

/// Spawn the FUSE session on its own background thread, distinct from the
/// FUSE library's own request threads.
pub fn spawn(
    fs: JunkFs,
    mountpoint: &Path,
) -> junk_core::Result<fuser::BackgroundSession> {
    let options = [
        fuser::MountOption::FSName("junknas".to_string()),
        fuser::MountOption::NoAtime,
    ];
    fuser::spawn_mount2(fs, mountpoint, &options).map_err(Error::Io)
}
