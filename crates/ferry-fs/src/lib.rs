//! On-disk layout for downloaded artifacts.
//!
//! Every artifact lives in one storage directory as a `<name>` (final) and
//! `<name>.part` (staging) pair. The staging file only ever grows by appending,
//! so its length is always a valid resume offset. The rename from staging to
//! final is the single atomic transition; everything else is idempotent cleanup.

mod error;
mod layout;

pub use error::{Error, Result};
pub use layout::{
    FileKind, META_SUFFIX, META_TEMP_SUFFIX, STAGING_SUFFIX, ScannedFile, StorageLayout, remove_if_exists,
    validate_filename,
};
