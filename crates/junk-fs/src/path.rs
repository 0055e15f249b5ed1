//! Path hygiene: reject dot components, the reserved `.jnk`
//! directory, and anything touching the manifest sidecar suffix.

use junk_core::Error;
use std::ffi::OsStr;

/// Suffix used for the on-disk manifest sidecar of a regular file
/// (`foo.txt` is backed by `foo.txt.__jnkmeta`). Never visible to FUSE
/// callers directly.
pub const META_SUFFIX: &str = ".__jnkmeta";

/// Reserved top-level directory name (holds chunks and refcounts).
pub const RESERVED_DIR: &str = ".jnk";

/// Validate a single path component supplied by a FUSE caller (`lookup`,
/// `create`, `mkdir`, `rename`'s `name`/`newname`).
pub fn validate_component(name: &OsStr) -> Result<&str, Error> {
    let s = name
        .to_str()
        .ok_or_else(|| Error::InvalidArgument("non-utf8 path component".into()))?;
    if s == "." || s == ".." {
        return Err(Error::InvalidArgument(format!(
            "reserved path component {s:?}"
        )));
    }
    if s == RESERVED_DIR {
        return Err(Error::InvalidArgument(
            "reserved directory name .jnk".into(),
        ));
    }
    if s.contains(META_SUFFIX) {
        return Err(Error::InvalidArgument(format!(
            "reserved suffix in path component {s:?}"
        )));
    }
    Ok(s)
}

/// Sidecar manifest path for the regular file at `rel` under `root`.
pub fn meta_path(root: &std::path::Path, rel: &std::path::Path) -> std::path::PathBuf {
    let mut name = rel
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(META_SUFFIX);
    match rel.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => root.join(parent).join(name),
        _ => root.join(name),
    }
}

/// Strip the sidecar suffix off a backing directory entry name, returning
/// the logical filename shown to FUSE callers, or `None` if `name` is not a
/// manifest sidecar (or is the reserved `.jnk` directory).
pub fn logical_name(name: &OsStr) -> Option<&str> {
    let s = name.to_str()?;
    if s == RESERVED_DIR {
        return None;
    }
    s.strip_suffix(META_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn dot_components_are_rejected() {
        assert!(validate_component(OsStr::new(".")).is_err());
        assert!(validate_component(OsStr::new("..")).is_err());
    }

    #[test]
    fn reserved_dir_is_rejected() {
        assert!(validate_component(OsStr::new(".jnk")).is_err());
    }

    #[test]
    fn meta_suffix_is_rejected_anywhere_in_component() {
        assert!(validate_component(OsStr::new("foo.__jnkmeta")).is_err());
        assert!(validate_component(OsStr::new("foo.__jnkmeta.bak")).is_err());
    }

    #[test]
    fn ordinary_names_pass() {
        assert_eq!(validate_component(OsStr::new("hello.txt")).unwrap(), "hello.txt");
    }

    #[test]
    fn meta_path_appends_suffix_to_file_name_only() {
        let root = Path::new("/data");
        let rel = Path::new("dir/hello.txt");
        assert_eq!(
            meta_path(root, rel),
            Path::new("/data/dir/hello.txt.__jnkmeta")
        );
    }

    #[test]
    fn logical_name_strips_suffix() {
        assert_eq!(logical_name(OsStr::new("hello.txt.__jnkmeta")), Some("hello.txt"));
        assert_eq!(logical_name(OsStr::new("subdir")), None);
        assert_eq!(logical_name(OsStr::new(".jnk")), None);
    }
}
