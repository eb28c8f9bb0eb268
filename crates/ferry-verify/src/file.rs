use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::{AnyHasher, ExpectedDigest, Result, VerificationError, VerifiedReader};

const BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of verifying a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No digest was expected; the file was accepted unread.
    Skipped,
    /// The file's digest matched. Carries the hex digest.
    Matched(String),
}

/// Verify `path` against `expected`, a hex digest string.
///
/// A blank `expected` skips verification and counts as success.
pub fn verify_file(path: &Path, expected: &str) -> Result<Verdict> {
    verify_file_with(path, expected, || false)
}

/// Like [`verify_file`], polling `should_stop` between buffers.
///
/// Returns [`VerificationError::Interrupted`] once `should_stop` reports true.
pub fn verify_file_with(
    path: &Path,
    expected: &str,
    should_stop: impl Fn() -> bool,
) -> Result<Verdict> {
    let Some(expected) = ExpectedDigest::parse_optional(expected)? else {
        debug!(path = %path.display(), "no expected digest, verification skipped");
        return Ok(Verdict::Skipped);
    };

    let reader = hash_file(path, &expected, should_stop)?;
    reader.finish(expected.as_bytes()).map(Verdict::Matched)
}

fn hash_file(
    path: &Path,
    expected: &ExpectedDigest,
    should_stop: impl Fn() -> bool,
) -> Result<VerifiedReader<File, AnyHasher>> {
    let file = open(path)?;
    let mut reader = VerifiedReader::new(file, AnyHasher::new(expected.algorithm()));
    drain(path, &mut reader, should_stop)?;
    debug!(path = %path.display(), bytes = reader.bytes_read(), "hashed file");
    Ok(reader)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| VerificationError::Io {
        path:   path.to_path_buf(),
        source: e,
    })
}

fn drain(
    path: &Path,
    reader: &mut VerifiedReader<File, AnyHasher>,
    should_stop: impl Fn() -> bool,
) -> Result<()> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        if should_stop() {
            return Err(VerificationError::Interrupted);
        }
        let n = reader.read(&mut buffer).map_err(|e| VerificationError::Io {
            path:   path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            return Ok(());
        }
    }
}
