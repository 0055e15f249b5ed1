//! Curve25519 node identity: keypair generation, base64 codec, on-disk
//! persistence of the private key file.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use curve25519_dalek::constants::X25519_BASEPOINT;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{OsRng, RngCore};
use std::fs;
use std::io::Write as _;
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid base64 key: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("key must decode to exactly 32 bytes, got {0}")]
    WrongLength(usize),
    #[error("io error reading key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// A Curve25519 keypair as used for the node's overlay identity, with
/// WireGuard-compatible scalar clamping and base64-encoded fields.
#[derive(Clone)]
pub struct Keypair {
    private: Zeroizing<[u8; 32]>,
    public: [u8; 32],
}

impl Keypair {
    /// Generate a fresh keypair using the OS RNG, with the private scalar
    /// clamped per the X25519 convention (the same clamping WireGuard uses).
    pub fn generate() -> Self {
        let mut raw = [0u8; 32];
        OsRng.fill_bytes(&mut raw);
        Self::from_clamped_private_bytes(raw)
    }

    /// Derive a keypair from a 32-byte private key, applying X25519 clamping
    /// and recomputing the public key. `ConfigStore::ensure_wg_keys` uses
    /// this to always recompute the public key from the effective private
    /// key rather than trust a stored one.
    pub fn from_private_bytes(mut private: [u8; 32]) -> Self {
        clamp_scalar(&mut private);
        Self::from_clamped_private_bytes(private)
    }

    fn from_clamped_private_bytes(private: [u8; 32]) -> Self {
        let scalar = Scalar::from_bytes_mod_order(private);
        let public: MontgomeryPoint = (scalar * X25519_BASEPOINT).to_montgomery();
        Self {
            private: Zeroizing::new(private),
            public: public.to_bytes(),
        }
    }

    pub fn private_bytes(&self) -> &[u8; 32] {
        &self.private
    }

    pub fn public_bytes(&self) -> &[u8; 32] {
        &self.public
    }

    pub fn private_base64(&self) -> String {
        B64.encode(self.private.as_slice())
    }

    pub fn public_base64(&self) -> String {
        B64.encode(self.public)
    }

    /// Recompute the public key for an externally supplied private key,
    /// without generating anything new.
    pub fn public_for(private_base64: &str) -> Result<String> {
        let bytes = decode_key(private_base64)?;
        Ok(Self::from_private_bytes(bytes).public_base64())
    }
}

fn decode_key(s: &str) -> Result<[u8; 32]> {
    let raw = B64.decode(s.trim())?;
    raw.try_into()
        .map_err(|v: Vec<u8>| IdentityError::WrongLength(v.len()))
}

/// Parse a base64-encoded Curve25519 key (private or public) into raw bytes.
pub fn decode_base64_key(s: &str) -> Result<[u8; 32]> {
    decode_key(s)
}

/// X25519 scalar clamping: clear the low 3 bits, clear the top bit, set bit 6.
fn clamp_scalar(bytes: &mut [u8; 32]) {
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
}

/// Load the private key file at `path` (a single base64 line, trimmed of
/// surrounding whitespace). Returns `Ok(None)` if the file does not exist.
pub fn load_private_key_file(path: &Path) -> Result<Option<Keypair>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let bytes = decode_key(contents.trim())?;
            Ok(Some(Keypair::from_private_bytes(bytes)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(IdentityError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write the private key file, mode 0600, as a single base64 line.
pub fn save_private_key_file(path: &Path, keypair: &Keypair) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|source| IdentityError::Io {
        path: path.display().to_string(),
        source,
    })?;
    file.write_all(keypair.private_base64().as_bytes())
        .map_err(|source| IdentityError::Io {
            path: path.display().to_string(),
            source,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(|source| IdentityError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_is_deterministic_from_private() {
        let kp = Keypair::generate();
        let recomputed = Keypair::from_private_bytes(*kp.private_bytes());
        assert_eq!(kp.public_bytes(), recomputed.public_bytes());
    }

    #[test]
    fn base64_round_trips_and_is_44_chars() {
        let kp = Keypair::generate();
        assert_eq!(kp.private_base64().len(), 44);
        assert_eq!(kp.public_base64().len(), 44);
        let decoded = decode_base64_key(&kp.private_base64()).unwrap();
        assert_eq!(&decoded, kp.private_bytes());
    }

    #[test]
    fn clamping_is_idempotent_on_public_derivation() {
        let bytes = [7u8; 32];
        let a = Keypair::from_private_bytes(bytes);
        let b = Keypair::from_private_bytes(bytes);
        assert_eq!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn key_file_round_trip_is_trimmed_and_mode_0600() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private.key");
        let kp = Keypair::generate();
        save_private_key_file(&path, &kp).unwrap();

        // Simulate an editor appending a trailing newline.
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push('\n');
        std::fs::write(&path, contents).unwrap();

        let loaded = load_private_key_file(&path).unwrap().unwrap();
        assert_eq!(loaded.private_bytes(), kp.private_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn missing_key_file_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.key");
        assert!(load_private_key_file(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(decode_base64_key("not valid base64!!").is_err());
        assert!(decode_base64_key(&base64::engine::general_purpose::STANDARD.encode([0u8; 16])).is_err());
    }
}
