use std::fmt;
use std::str::FromStr;

use crate::{Result, VerificationError};

/// Digest algorithms an expected digest may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Sha256,
    #[cfg(feature = "blake3")]
    Blake3,
}

impl Algorithm {
    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 32,
            #[cfg(feature = "blake3")]
            Algorithm::Blake3 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            #[cfg(feature = "blake3")]
            Algorithm::Blake3 => "blake3",
        }
    }
}

impl FromStr for Algorithm {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            #[cfg(feature = "blake3")]
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(VerificationError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A parsed expected digest: algorithm plus raw digest bytes.
///
/// Accepts bare hex (SHA-256) or an `algorithm:hex` form such as
/// `sha256:ab12...`. Hex is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    algorithm: Algorithm,
    bytes:     Vec<u8>,
}

impl ExpectedDigest {
    /// Parse an expected digest. Blank input means "unverified" and yields `None`.
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }

    pub fn algorithm(&self) -> Algorithm { self.algorithm }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn to_hex(&self) -> String { hex::encode(&self.bytes) }
}

impl FromStr for ExpectedDigest {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (algorithm, hex_part) = match s.split_once(':') {
            Some((algo, hex_part)) => (algo.parse::<Algorithm>()?, hex_part),
            None => (Algorithm::default(), s),
        };

        let bytes = hex::decode(hex_part.to_ascii_lowercase())
            .map_err(|_| VerificationError::InvalidDigest(s.to_string()))?;
        if bytes.len() != algorithm.digest_len() {
            return Err(VerificationError::InvalidDigest(s.to_string()));
        }

        Ok(Self { algorithm, bytes })
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_parse_bare_hex() {
        let digest: ExpectedDigest = HELLO.parse().unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Sha256);
        assert_eq!(digest.to_hex(), HELLO);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper = HELLO.to_ascii_uppercase();
        let digest: ExpectedDigest = format!("SHA256:{upper}").parse().unwrap();
        assert_eq!(digest.to_hex(), HELLO);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "abc".parse::<ExpectedDigest>(),
            Err(VerificationError::InvalidDigest(_))
        ));
        assert!(matches!(
            format!("md5:{HELLO}").parse::<ExpectedDigest>(),
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
        assert!("zz".repeat(32).parse::<ExpectedDigest>().is_err());
    }

    #[test]
    fn test_blank_is_unverified() {
        assert_eq!(ExpectedDigest::parse_optional("").unwrap(), None);
        assert_eq!(ExpectedDigest::parse_optional("   ").unwrap(), None);
        assert!(ExpectedDigest::parse_optional(HELLO).unwrap().is_some());
    }
}
