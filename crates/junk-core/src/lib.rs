//! Shared error type and small utilities used across every junkNAS crate.

mod time;

pub use time::{now_unix, now_unix_millis};

use thiserror::Error;

/// The kinds from the error handling design: every subsystem converts its
/// local failures into this one enum before it crosses a crate boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("corrupt manifest: {0}")]
    CorruptManifest(String),

    #[error("integrity fault: {0}")]
    IntegrityFault(String),

    #[error("out of space")]
    OutOfSpace,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("peer list full")]
    PeerFull,

    #[error("transient peer failure: {0}")]
    TransientPeer(String),
}

impl Error {
    /// POSIX errno this error maps to when surfaced through the FUSE adapter.
    pub fn to_errno(&self) -> libc_errno::Errno {
        use libc_errno::Errno;
        match self {
            Error::InvalidArgument(_) => Errno::EINVAL,
            Error::NotFound(_) => Errno::ENOENT,
            Error::IsDirectory(_) => Errno::EISDIR,
            Error::NotDirectory(_) => Errno::ENOTDIR,
            Error::CorruptManifest(_) | Error::IntegrityFault(_) | Error::Io(_) => Errno::EIO,
            Error::OutOfSpace => Errno::ENOSPC,
            Error::Forbidden(_) => Errno::EACCES,
            Error::PeerFull | Error::TransientPeer(_) => Errno::EIO,
        }
    }

    /// HTTP status this error maps to when surfaced through the web service.
    pub fn to_http_status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            Error::NotFound(_) => 404,
            Error::IsDirectory(_) | Error::NotDirectory(_) => 400,
            Error::CorruptManifest(_) | Error::IntegrityFault(_) | Error::Io(_) => 500,
            Error::OutOfSpace => 507,
            Error::Forbidden(_) => 403,
            Error::PeerFull => 400,
            Error::TransientPeer(_) => 504,
        }
    }
}

/// Tiny local errno mirror so `junk-core` does not pull in `libc` just for a
/// handful of constants used by both the FUSE and web mapping above.
pub mod libc_errno {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Errno {
        EINVAL,
        ENOENT,
        EISDIR,
        ENOTDIR,
        EIO,
        ENOSPC,
        EACCES,
    }

    impl Errno {
        pub fn as_raw(self) -> i32 {
            match self {
                Errno::EINVAL => libc::EINVAL,
                Errno::ENOENT => libc::ENOENT,
                Errno::EISDIR => libc::EISDIR,
                Errno::ENOTDIR => libc::ENOTDIR,
                Errno::EIO => libc::EIO,
                Errno::ENOSPC => libc::ENOSPC,
                Errno::EACCES => libc::EACCES,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fixed chunk window used by the manifest codec, chunk store, and FUSE
/// adapter; every chunk is exactly this many bytes once committed.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Number of 1 MiB windows needed to cover `size` bytes.
pub fn chunks_needed(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE)
}

/// SHA-256 hex digest of the given bytes, used throughout the chunk/manifest
/// layer as the canonical "hash" representation.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The two-hex-char shard prefix used by both the chunk store and the
/// refcount index, sharded 256 ways.
pub fn shard_prefix(hash: &str) -> &str {
    &hash[..2.min(hash.len())]
}

#[cfg(test)]
mod shared_tests {
    use super::*;

    #[test]
    fn chunks_needed_rounds_up() {
        assert_eq!(chunks_needed(0), 0);
        assert_eq!(chunks_needed(1), 1);
        assert_eq!(chunks_needed(CHUNK_SIZE), 1);
        assert_eq!(chunks_needed(CHUNK_SIZE + 1), 2);
    }

    #[test]
    fn sha256_hex_is_64_chars() {
        assert_eq!(sha256_hex(b"hello world").len(), 64);
    }

    #[test]
    fn shard_prefix_is_first_two_hex_chars() {
        assert_eq!(shard_prefix(&sha256_hex(b"x")), &sha256_hex(b"x")[..2]);
    }
}
