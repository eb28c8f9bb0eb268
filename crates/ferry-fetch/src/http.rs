use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line, the headers a transfer cares about, and the streaming body.
pub struct HttpResponse<E> {
    pub status:         u16,
    /// `Content-Length` of this response body (not of the whole resource).
    pub content_length: Option<u64>,
    pub content_range:  Option<String>,
    pub etag:           Option<String>,
    pub last_modified:  Option<String>,
    pub body:           BoxStream<'static, std::result::Result<Bytes, E>>,
}

impl<E> std::fmt::Debug for HttpResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// The one operation a transfer needs: an anonymous GET with extra request
/// headers, returning whatever status the server chose. Implementations must
/// not treat non-2xx statuses as errors; the session interprets them.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for transport failures (DNS, connect, TLS, timeouts).
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = std::result::Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

/// Transport settings for [`ReqwestClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Maximum idle time between body reads.
    pub read_timeout:    Duration,
    pub user_agent:      String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout:    Duration::from_secs(60),
            user_agent:      concat!("ferry/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use futures_util::StreamExt;
    use reqwest::header::{self, HeaderMap};

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(options: &ClientOptions) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(options.connect_timeout)
                .read_timeout(options.read_timeout)
                .user_agent(options.user_agent.clone())
                .build()?;
            Ok(Self { client })
        }
    }

    fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<HttpResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);
            for (key, value) in headers {
                request = request.header(key, value);
            }

            let response = request.send().await.map_err(|e| e.without_url())?;

            let status = response.status().as_u16();
            let content_length = response.content_length();
            let content_range = header_str(response.headers(), header::CONTENT_RANGE);
            let etag = header_str(response.headers(), header::ETAG);
            let last_modified = header_str(response.headers(), header::LAST_MODIFIED);
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| e.without_url()));

            Ok(HttpResponse {
                status,
                content_length,
                content_range,
                etag,
                last_modified,
                body: Box::pin(body),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
