use std::io::{self, Read};

use crate::{Hasher, Result, VerificationError};

/// Streaming reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader:     R,
    hasher:     H,
    bytes_read: u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 { self.bytes_read }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Finalize against the expected digest. Returns the actual digest as hex.
    pub fn finish(self, expected: &[u8]) -> Result<String> {
        let actual = self.hasher.finalize();
        if actual == expected {
            Ok(hex::encode(actual))
        } else {
            Err(VerificationError::Mismatch {
                expected: hex::encode(expected),
                actual:   hex::encode(actual),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sha256Hasher;
    use std::io::Cursor;

    #[test]
    fn test_verified_reader_success() {
        let data = b"test data for verification";
        let expected = Sha256Hasher::digest(data);

        let mut verified = VerifiedReader::new(Cursor::new(data), Sha256Hasher::new());
        let mut sink = Vec::new();
        io::copy(&mut verified, &mut sink).unwrap();

        assert_eq!(verified.bytes_read(), data.len() as u64);
        assert_eq!(verified.finish(&expected).unwrap(), hex::encode(expected));
        assert_eq!(sink, data);
    }

    #[test]
    fn test_verified_reader_hash_mismatch() {
        let mut verified = VerifiedReader::new(Cursor::new(b"test data"), Sha256Hasher::new());
        io::copy(&mut verified, &mut io::sink()).unwrap();

        match verified.finish(&[0; 32]) {
            Err(VerificationError::Mismatch { expected, actual }) => {
                assert_eq!(expected, "0".repeat(64));
                assert_ne!(actual, expected);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
