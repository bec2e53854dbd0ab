//! Network transfers behind remote endpoints.
//!
//! A [`Transfer`] moves a whole recording in one direction: `upload`
//! consumes a stream of chunks as a request body, `download` yields the
//! response body as a stream of chunks. Sinks and sources drive these from
//! a dedicated task so the engines never wait on the network directly.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Url};

use crate::error::TransferError;

/// Chunks handed to [`Transfer::upload`].
pub type UploadBody = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Chunks produced by [`Transfer::download`].
pub type DownloadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Boxed future returned by [`Transfer`] methods.
pub type TransferFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// A byte-stream transport for recordings.
pub trait Transfer: Send + Sync {
    /// Send `body` to the remote end. Resolves once the remote end has
    /// accepted the whole body.
    fn upload(&self, body: UploadBody) -> TransferFuture<'_, ()>;

    /// Start fetching the remote recording.
    fn download(&self) -> TransferFuture<'_, DownloadStream>;
}

/// HTTP transport: uploads are streamed `POST` bodies, downloads are
/// streamed `GET` responses.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
    url: Url,
}

impl HttpTransfer {
    /// Create a transport for `url`.
    pub fn new(url: Url, connect_timeout: Duration) -> Result<Self, TransferError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("shatty/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url })
    }

    /// The remote URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), TransferError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransferError::Status {
            status: status.as_u16(),
        })
    }
}

impl Transfer for HttpTransfer {
    fn upload(&self, body: UploadBody) -> TransferFuture<'_, ()> {
        Box::pin(async move {
            tracing::debug!(url = %self.url, "starting upload");
            let response = self
                .client
                .post(self.url.clone())
                .body(reqwest::Body::wrap_stream(body))
                .send()
                .await?;
            check_status(response.status())?;
            tracing::debug!(url = %self.url, status = %response.status(), "upload complete");
            Ok(())
        })
    }

    fn download(&self) -> TransferFuture<'_, DownloadStream> {
        Box::pin(async move {
            tracing::debug!(url = %self.url, "starting download");
            let response = self.client.get(self.url.clone()).send().await?;
            check_status(response.status())?;
            let stream = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
            Ok(Box::pin(stream) as DownloadStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_check() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        assert!(check_status(reqwest::StatusCode::NO_CONTENT).is_ok());
        assert!(matches!(
            check_status(reqwest::StatusCode::NOT_FOUND),
            Err(TransferError::Status { status: 404 })
        ));
    }

    #[test]
    fn http_transfer_keeps_url() {
        let url = Url::parse("http://127.0.0.1:9/rec").unwrap();
        let transfer = HttpTransfer::new(url.clone(), Duration::from_secs(1)).unwrap();
        assert_eq!(transfer.url(), &url);
    }
}
