//! One resumable transfer attempt into a staging file.

use std::io;
use std::path::Path;

use futures_util::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, TransferError};
use crate::http::{HttpClient, HttpResponse};
use crate::range::{parse_content_range, parse_unsatisfied_range, range_header};
use crate::validators::ResumeValidators;

/// Bytes written between progress reports and cancellation checks.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Where to fetch from and where the bytes go.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub url:          &'a str,
    pub staging_path: &'a Path,
    /// Resume validator sidecar. `None` disables `If-Range`.
    pub meta_path:    Option<&'a Path>,
}

/// Result of a transfer that ran to the end of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Length of the staging file once the stream ended.
    pub bytes_written: u64,
    pub total_bytes:   Option<u64>,
    /// Offset the body was appended at; 0 for a fresh download.
    pub resumed_from:  u64,
}

/// How to treat a response given the offset that was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plan {
    /// `206` continuing exactly at the requested offset.
    Append { total: Option<u64> },
    /// Body is the whole resource; staging restarts at zero.
    Fresh { total: Option<u64> },
    /// `416` confirming the staged bytes already cover the resource.
    AlreadyComplete { total: u64 },
    /// The server cannot continue at this offset; reissue without `Range`.
    RangeNotSupported,
}

pub(crate) fn plan<E>(offset: u64, response: &HttpResponse<E>) -> Result<Plan> {
    let content_range = response.content_range.as_deref();

    match response.status {
        200 => Ok(Plan::Fresh {
            total: response.content_length,
        }),
        206 => {
            let Some(raw) = content_range else {
                let total = response.content_length.map(|len| offset + len);
                return Ok(if offset > 0 {
                    Plan::Append { total }
                } else {
                    Plan::Fresh { total }
                });
            };
            let range = parse_content_range(raw);
            match range {
                Some(range) if range.start == offset => {
                    let total = range.total.or(response.content_length.map(|len| offset + len));
                    Ok(if offset > 0 {
                        Plan::Append { total }
                    } else {
                        Plan::Fresh { total }
                    })
                }
                _ if offset > 0 => Ok(Plan::RangeNotSupported),
                _ => Err(TransferError::InvalidContentRange(raw.to_string())),
            }
        }
        416 if offset > 0 => match content_range.and_then(parse_unsatisfied_range) {
            Some(total) if total == offset => Ok(Plan::AlreadyComplete { total }),
            _ => Ok(Plan::RangeNotSupported),
        },
        status => Err(TransferError::HttpStatus { status }),
    }
}

/// Drives one GET into a staging file.
///
/// With a non-empty staging file the request carries `Range: bytes=<len>-`.
/// A `206` appends; a `200` means the range was ignored, so the staging file
/// is truncated and the full body written from zero. Cancellation is checked
/// while waiting on the network and after every chunk written.
pub struct TransferSession<'a, C> {
    client:     &'a C,
    cancel:     CancellationToken,
    chunk_size: usize,
}

impl<'a, C: HttpClient> TransferSession<'a, C> {
    pub fn new(client: &'a C, cancel: CancellationToken) -> Self {
        Self {
            client,
            cancel,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run the transfer, calling `on_progress(bytes_on_disk, total)` per chunk.
    pub async fn run<F>(&self, request: &TransferRequest<'_>, mut on_progress: F) -> Result<TransferOutcome>
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let mut offset = staged_len(request.staging_path).await?;
        let mut validators = match request.meta_path {
            Some(meta) if offset > 0 => ResumeValidators::load(meta).await,
            _ => None,
        };

        // A second round only happens after a range restart, at offset 0.
        for _ in 0..2 {
            let headers = request_headers(offset, validators.as_ref());
            debug!(url = request.url, offset, "sending request");
            let response = self.send(request.url, &headers).await?;

            match plan(offset, &response)? {
                Plan::AlreadyComplete { total } => {
                    debug!(total, "staging file already holds the whole resource");
                    on_progress(total, Some(total));
                    return Ok(TransferOutcome {
                        bytes_written: total,
                        total_bytes:   Some(total),
                        resumed_from:  offset,
                    });
                }
                Plan::RangeNotSupported => {
                    warn!(offset, status = response.status, "server cannot resume here; restarting from zero");
                    drop(response);
                    truncate(request.staging_path).await?;
                    if let Some(meta) = request.meta_path {
                        remove_quietly(meta).await;
                    }
                    offset = 0;
                    validators = None;
                }
                Plan::Append { total } => {
                    debug!(offset, ?total, "resuming");
                    let written = self
                        .stream_body(request.staging_path, response, offset, total, &mut on_progress)
                        .await?;
                    return Ok(TransferOutcome {
                        bytes_written: written,
                        total_bytes:   total,
                        resumed_from:  offset,
                    });
                }
                Plan::Fresh { total } => {
                    if offset > 0 {
                        warn!(offset, "server ignored the range request; restarting from zero");
                    }
                    if let Some(meta) = request.meta_path {
                        let validators = ResumeValidators::new(response.etag.clone(), response.last_modified.clone());
                        store_validators(meta, validators).await;
                    }
                    let written = self
                        .stream_body(request.staging_path, response, 0, total, &mut on_progress)
                        .await?;
                    return Ok(TransferOutcome {
                        bytes_written: written,
                        total_bytes:   total,
                        resumed_from:  0,
                    });
                }
            }
        }

        Err(TransferError::InvalidContentRange(
            "server refused to serve the resource from offset 0".to_string(),
        ))
    }

    async fn send(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse<C::Error>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            response = self.client.get(url, headers) => response.map_err(TransferError::network),
        }
    }

    async fn stream_body<F>(
        &self,
        path: &Path,
        mut response: HttpResponse<C::Error>,
        start: u64,
        total: Option<u64>,
        on_progress: &mut F,
    ) -> Result<u64>
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let mut file = if start > 0 {
            OpenOptions::new().append(true).open(path).await
        } else {
            File::create(path).await
        }
        .map_err(TransferError::io(path))?;

        let mut written = start;
        on_progress(written, total);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    settle(&mut file, path).await?;
                    return Err(TransferError::Cancelled);
                }
                chunk = response.body.next() => chunk,
            };

            let bytes = match chunk {
                None => break,
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    settle(&mut file, path).await?;
                    return Err(TransferError::network(e));
                }
            };

            for piece in bytes.chunks(self.chunk_size) {
                file.write_all(piece).await.map_err(TransferError::io(path))?;
                // Reported offsets must already be on disk.
                file.flush().await.map_err(TransferError::io(path))?;
                written += piece.len() as u64;
                on_progress(written, total);

                if self.cancel.is_cancelled() {
                    settle(&mut file, path).await?;
                    return Err(TransferError::Cancelled);
                }
            }
        }

        file.sync_all().await.map_err(TransferError::io(path))?;

        if let Some(expected) = total
            && written < expected
        {
            return Err(TransferError::UnexpectedEof {
                expected,
                received: written,
            });
        }

        Ok(written)
    }
}

fn request_headers(offset: u64, validators: Option<&ResumeValidators>) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if offset > 0 {
        headers.push(("Range".to_string(), range_header(offset)));
        if let Some(if_range) = validators.and_then(ResumeValidators::if_range) {
            headers.push(("If-Range".to_string(), if_range.to_string()));
        }
    }
    headers
}

async fn staged_len(path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(TransferError::io(path)(e)),
    }
}

async fn truncate(path: &Path) -> Result<()> {
    File::create(path).await.map(drop).map_err(TransferError::io(path))
}

async fn settle(file: &mut File, path: &Path) -> Result<()> {
    file.flush().await.map_err(TransferError::io(path))?;
    file.sync_data().await.map_err(TransferError::io(path))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove resume metadata");
    }
}

async fn store_validators(meta: &Path, validators: ResumeValidators) {
    if validators.is_empty() {
        remove_quietly(meta).await;
    } else if let Err(e) = validators.save(meta).await {
        warn!(error = %e, "failed to persist resume validators");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(status: u16, content_length: Option<u64>, content_range: Option<&str>) -> HttpResponse<io::Error> {
        HttpResponse {
            status,
            content_length,
            content_range: content_range.map(str::to_string),
            etag: None,
            last_modified: None,
            body: Box::pin(futures_util::stream::empty::<std::result::Result<bytes::Bytes, io::Error>>()),
        }
    }

    #[test]
    fn test_plan_fresh_download() {
        assert_eq!(plan(0, &head(200, Some(1000), None)).unwrap(), Plan::Fresh { total: Some(1000) });
        assert_eq!(plan(0, &head(200, None, None)).unwrap(), Plan::Fresh { total: None });
    }

    #[test]
    fn test_plan_partial_content() {
        assert_eq!(
            plan(400, &head(206, Some(600), Some("bytes 400-999/1000"))).unwrap(),
            Plan::Append { total: Some(1000) }
        );
        assert_eq!(
            plan(400, &head(206, Some(600), None)).unwrap(),
            Plan::Append { total: Some(1000) }
        );
        assert_eq!(
            plan(400, &head(206, Some(600), Some("bytes 400-999/*"))).unwrap(),
            Plan::Append { total: Some(1000) }
        );
    }

    #[test]
    fn test_plan_ignored_range_restarts() {
        assert_eq!(plan(400, &head(200, Some(1000), None)).unwrap(), Plan::Fresh { total: Some(1000) });
    }

    #[test]
    fn test_plan_misaligned_partial_content() {
        assert_eq!(
            plan(400, &head(206, Some(700), Some("bytes 300-999/1000"))).unwrap(),
            Plan::RangeNotSupported
        );
        assert!(matches!(
            plan(0, &head(206, Some(10), Some("bytes 5-14/15"))),
            Err(TransferError::InvalidContentRange(_))
        ));
    }

    #[test]
    fn test_plan_range_not_satisfiable() {
        assert_eq!(
            plan(1000, &head(416, None, Some("bytes */1000"))).unwrap(),
            Plan::AlreadyComplete { total: 1000 }
        );
        assert_eq!(plan(1200, &head(416, None, Some("bytes */1000"))).unwrap(), Plan::RangeNotSupported);
        assert!(matches!(
            plan(0, &head(416, None, None)),
            Err(TransferError::HttpStatus { status: 416 })
        ));
    }

    #[test]
    fn test_plan_error_status() {
        for status in [204, 301, 403, 404, 429, 500, 503] {
            assert!(matches!(
                plan(0, &head(status, None, None)),
                Err(TransferError::HttpStatus { status: s }) if s == status
            ));
        }
    }

    #[test]
    fn test_request_headers() {
        assert!(request_headers(0, None).is_empty());

        let validators = ResumeValidators::new(Some("\"v1\"".into()), None);
        let headers = request_headers(400, Some(&validators));
        assert_eq!(headers, vec![
            ("Range".to_string(), "bytes=400-".to_string()),
            ("If-Range".to_string(), "\"v1\"".to_string()),
        ]);
    }
}
