//! The FUSE adapter: chunk-backed regular files over a
//! passthrough backing directory tree, with per-open-handle dirty-chunk
//! staging and commit-on-release.

mod fs;
mod handle;
mod inode;
mod path;

pub use fs::{spawn, JunkFs};
pub use handle::OpenHandle;
pub use path::{logical_name, meta_path, validate_component, META_SUFFIX, RESERVED_DIR};
