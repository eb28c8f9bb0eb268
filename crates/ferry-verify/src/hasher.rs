use sha2::Digest;

use crate::Algorithm;

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Default for Sha256Hasher {
    fn default() -> Self { Self::new() }
}

impl Sha256Hasher {
    pub fn new() -> Self { Self(sha2::Sha256::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { sha2::Sha256::digest(data).to_vec() }
}

#[cfg(feature = "blake3")]
pub struct Blake3Hasher(blake3::Hasher);

#[cfg(feature = "blake3")]
impl Hasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().as_bytes().to_vec() }
}

#[cfg(feature = "blake3")]
impl Default for Blake3Hasher {
    fn default() -> Self { Self::new() }
}

#[cfg(feature = "blake3")]
impl Blake3Hasher {
    pub fn new() -> Self { Self(blake3::Hasher::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { blake3::hash(data).as_bytes().to_vec() }
}

/// Hasher selected at runtime from an [`Algorithm`].
pub enum AnyHasher {
    Sha256(Sha256Hasher),
    #[cfg(feature = "blake3")]
    Blake3(Blake3Hasher),
}

impl AnyHasher {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha256 => Self::Sha256(Sha256Hasher::new()),
            #[cfg(feature = "blake3")]
            Algorithm::Blake3 => Self::Blake3(Blake3Hasher::new()),
        }
    }
}

impl Hasher for AnyHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize(),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.finalize(),
        }
    }
}
