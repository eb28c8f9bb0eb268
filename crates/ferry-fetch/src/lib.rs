//! Single-stream resumable HTTP transfers.
//!
//! A [`TransferSession`] performs one GET into a staging file, resuming with a
//! `Range` request when the staging file already holds a prefix. The session
//! never retries; callers decide what to do with a [`TransferError`].
//!
//! # Key Features
//!
//! - **Append-only staging**: the staging file's length is always a valid resume offset
//! - **Range fallback**: a `200` answer to a ranged request restarts from zero
//! - **If-Range validators**: resumes are refused by the server if the origin changed
//! - **Cooperative cancellation**: checked at every chunk boundary

mod error;
mod http;
mod range;
mod session;
mod validators;

pub use error::{Result, TransferError};
pub use http::{BoxStream, ClientOptions, HttpClient, HttpResponse};
pub use range::{ContentRange, parse_content_range, parse_unsatisfied_range, range_header};
pub use session::{DEFAULT_CHUNK_SIZE, TransferOutcome, TransferRequest, TransferSession};
pub use validators::ResumeValidators;

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;

pub use tokio_util::sync::CancellationToken;
