//! Opening remote byte sources.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::stream::ProgressStream;

/// Opens a [`ProgressStream`] for a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to `url` and returns its body as a chunk stream.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the endpoint is unreachable or answers
    /// with a non-success status.
    async fn open(&self, url: &str) -> Result<ProgressStream>;
}

/// Builds the HTTP client used for downloads.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// [`Transport`] over plain HTTP(S) GET requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the default client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(build_http_client()?))
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str) -> Result<ProgressStream> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{url} answered {status}")));
        }

        let total = response.content_length();
        log::debug!("Opened {url} ({total:?} bytes declared)");

        let chunks = response.bytes_stream().map(|r| r.map_err(Error::from)).boxed();
        Ok(ProgressStream::new(total, chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn image_router() -> Router {
        Router::new().route("/test-image.png", get(|| async { vec![7u8; 100] }))
    }

    #[tokio::test]
    async fn open_reads_declared_length_and_body() {
        let base = serve(image_router()).await;
        let transport = HttpTransport::new().unwrap();

        let mut stream = transport
            .open(&format!("{base}/test-image.png"))
            .await
            .unwrap();
        assert_eq!(stream.total_bytes(), Some(100));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.on_progress(move |p| sink.lock().unwrap().push(p));

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await.unwrap() {
            body.extend_from_slice(&chunk);
        }

        assert_eq!(body, vec![7u8; 100]);
        assert_eq!(seen.lock().unwrap().last(), Some(&100));
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let base = serve(image_router()).await;
        let transport = HttpTransport::new().unwrap();

        let err = transport
            .open(&format!("{base}/missing.png"))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new().unwrap();
        let err = transport
            .open(&format!("http://{addr}/test-image.png"))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
