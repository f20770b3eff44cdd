//! Digest primitive used for footer and operation checksums.

pub const DIGEST_LEN: usize = 32;

pub type Checksum = [u8; DIGEST_LEN];

pub trait Digest {
    fn name(&self) -> &'static str;

    fn digest(&self, bytes: &[u8]) -> Checksum;

    /// `false` for implementations whose output must not be compared.
    fn is_verifying(&self) -> bool {
        true
    }
}

/// SHA-256, the digest written by the container writer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Digest;

impl Digest for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, bytes: &[u8]) -> Checksum {
        use sha2::Digest as _;
        let mut hasher = sha2::Sha256::new();
        hasher.update(bytes);
        let mut sum = [0u8; DIGEST_LEN];
        sum.copy_from_slice(&hasher.finalize());
        sum
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Digest;

impl Digest for Blake3Digest {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn digest(&self, bytes: &[u8]) -> Checksum {
        let mut hasher = blake3::Hasher::new();
        hasher.update(bytes);
        *hasher.finalize().as_bytes()
    }
}

/// Non-verifying digest: always yields zeros and reports itself as such, so
/// checksum comparisons are skipped instead of trivially passing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDigest;

impl Digest for NullDigest {
    fn name(&self) -> &'static str {
        "none"
    }

    fn digest(&self, _bytes: &[u8]) -> Checksum {
        [0u8; DIGEST_LEN]
    }

    fn is_verifying(&self) -> bool {
        false
    }
}
