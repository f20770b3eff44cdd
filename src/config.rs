use crate::digest::{Blake3Digest, Digest, NullDigest, Sha256Digest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestKind {
    Sha256,
    Blake3,
    /// Checksums are not verified. Counts and sizes still are.
    Disabled,
}

impl Default for DigestKind {
    fn default() -> Self {
        Self::Sha256
    }
}

impl DigestKind {
    pub fn build(self) -> Box<dyn Digest> {
        match self {
            DigestKind::Sha256 => Box::new(Sha256Digest),
            DigestKind::Blake3 => Box::new(Blake3Digest),
            DigestKind::Disabled => Box::new(NullDigest),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FooterPolicy {
    /// A missing footer is tolerated; whatever operations were fully written
    /// are exposed without verification.
    Recover,
    /// A missing footer fails the parse.
    Require,
}

impl Default for FooterPolicy {
    fn default() -> Self {
        Self::Recover
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReaderConfig {
    pub digest: DigestKind,
    pub footer_policy: FooterPolicy,
}
