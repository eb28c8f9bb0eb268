//! Content verification for downloaded artifacts.
//!
//! Files are streamed through a [`Hasher`] with a fixed-size buffer and never
//! read into memory whole. A blank expected digest skips verification: that is
//! a trust gap callers accept explicitly by leaving the digest empty.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use ferry_verify::{Sha256Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish(&expected).unwrap();
//! ```

pub use self::digest::{Algorithm, ExpectedDigest};
pub use self::error::{Result, VerificationError};
pub use self::file::{Verdict, verify_file, verify_file_with};
pub use self::hasher::{AnyHasher, Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

#[cfg(feature = "blake3")]
pub use self::hasher::Blake3Hasher;

mod digest;
mod error;
mod file;
mod hasher;
mod reader;
