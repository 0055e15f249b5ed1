//! Safe path parsing for `/browse/` and `/files/`: accepts only relative,
//! `..`-free paths that do not start with `/`. Reuses the same component
//! hygiene rules as the FUSE adapter so `.jnk` and manifest sidecars are
//! never reachable through the HTTP surface either.

use junk_core::Error;
use std::ffi::OsStr;
use std::path::PathBuf;

pub fn parse_relative(raw: &str) -> Result<PathBuf, Error> {
    if raw.starts_with('/') {
        return Err(Error::InvalidArgument("path must not start with /".into()));
    }
    let mut out = PathBuf::new();
    for component in raw.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        if component == ".." {
            return Err(Error::InvalidArgument("path must not contain ..".into()));
        }
        junk_fs::validate_component(OsStr::new(component))?;
        out.push(component);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_relative_path_parses() {
        assert_eq!(parse_relative("a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
    }

    #[test]
    fn empty_path_is_the_root() {
        assert_eq!(parse_relative("").unwrap(), PathBuf::new());
    }

    #[test]
    fn leading_slash_is_rejected() {
        assert!(parse_relative("/a").is_err());
    }

    #[test]
    fn dot_dot_is_rejected() {
        assert!(parse_relative("a/../b").is_err());
    }

    #[test]
    fn reserved_directory_is_rejected() {
        assert!(parse_relative(".jnk/chunks").is_err());
    }
}
