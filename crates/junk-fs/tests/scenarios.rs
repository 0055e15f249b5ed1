//! Drives the create/write/release/read pipeline directly through
//! `OpenHandle` and `ChunkStore`, bypassing the thin `fuser::Filesystem`
//! glue (which requires a real kernel mount to exercise end to end).
//! This covers the same ground as the FUSE adapter's contract.

use junk_chunkstore::{apply_multiset_diff, current_refcount, ChunkStore};
use junk_core::{sha256_hex, Error, CHUNK_SIZE};
use junk_fs::OpenHandle;
use std::path::PathBuf;

fn store() -> (tempfile::TempDir, ChunkStore) {
    let dir = tempfile::tempdir().unwrap();
    let root: PathBuf = dir.path().join("root0");
    (dir, ChunkStore::open(vec![root], None).unwrap())
}

#[test]
fn create_and_re_read_round_trips_short_write() {
    let (_d, store) = store();
    let mut handle = OpenHandle::for_new_file(PathBuf::from("hello.txt"));

    let data = b"hello world";
    {
        let buf = handle.dirty_chunk_mut(&store, 0).unwrap();
        buf[..data.len()].copy_from_slice(data);
    }
    handle.manifest.size = data.len() as u64;
    handle.commit_dirty_chunks(&store).unwrap();

    assert_eq!(handle.manifest.size, 11);
    let hash = handle.manifest.get(0).unwrap().to_string();
    assert_eq!(hash, sha256_hex(&{
        let mut padded = vec![0u8; CHUNK_SIZE as usize];
        padded[..data.len()].copy_from_slice(data);
        padded
    }));

    apply_multiset_diff(&store, &[], &handle.manifest.hash_multiset()).unwrap();
    assert_eq!(current_refcount(store.primary(), &hash), 1);

    let reopened = OpenHandle::opened(handle.rel_path.clone(), handle.manifest.clone());
    let read_back = reopened.load_chunk(&store, 0).unwrap();
    assert_eq!(&read_back[..data.len()], data);
    assert!(read_back[data.len()..].iter().all(|&b| b == 0));
}

#[test]
fn dedup_across_files_keeps_chunk_until_last_reference_drops() {
    let (_d, store) = store();
    let content = {
        let mut buf = vec![0u8; CHUNK_SIZE as usize];
        buf[..4].copy_from_slice(b"ABCD");
        buf
    };

    let mut a = OpenHandle::for_new_file(PathBuf::from("a.bin"));
    a.dirty.insert(0, content.clone());
    a.manifest.size = 4;
    a.commit_dirty_chunks(&store).unwrap();
    apply_multiset_diff(&store, &[], &a.manifest.hash_multiset()).unwrap();

    let mut b = OpenHandle::for_new_file(PathBuf::from("b.bin"));
    b.dirty.insert(0, content.clone());
    b.manifest.size = 4;
    b.commit_dirty_chunks(&store).unwrap();
    apply_multiset_diff(&store, &[], &b.manifest.hash_multiset()).unwrap();

    let hash = a.manifest.get(0).unwrap().to_string();
    assert_eq!(current_refcount(store.primary(), &hash), 2);
    assert!(store.contains(&hash));

    apply_multiset_diff(&store, &a.manifest.hash_multiset(), &[]).unwrap();
    assert!(store.contains(&hash));
    assert_eq!(current_refcount(store.primary(), &hash), 1);

    apply_multiset_diff(&store, &b.manifest.hash_multiset(), &[]).unwrap();
    assert!(!store.contains(&hash));
}

#[test]
fn sparse_grow_commits_no_chunks() {
    let (_d, store) = store();
    let mut handle = OpenHandle::for_new_file(PathBuf::from("s"));
    handle.grow_to(3 * 1024 * 1024);
    handle.commit_dirty_chunks(&store).unwrap();

    assert_eq!(handle.manifest.size, 3 * 1024 * 1024);
    assert!(handle.manifest.hash_multiset().is_empty());

    for idx in 0..3 {
        let buf = handle.load_chunk(&store, idx).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }
}

#[test]
fn integrity_fault_surfaces_on_read() {
    let (_d, store) = store();
    let mut handle = OpenHandle::for_new_file(PathBuf::from("f"));
    {
        let buf = handle.dirty_chunk_mut(&store, 0).unwrap();
        buf[..5].copy_from_slice(b"stuff");
    }
    handle.manifest.size = 5;
    handle.commit_dirty_chunks(&store).unwrap();

    let hash = handle.manifest.get(0).unwrap().to_string();
    let path = store.locate(&hash).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let reopened = OpenHandle::opened(handle.rel_path.clone(), handle.manifest.clone());
    let err = reopened.load_chunk(&store, 0).unwrap_err();
    assert!(matches!(err, Error::IntegrityFault(_)));
}
