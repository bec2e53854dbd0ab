//! Recording endpoints: where frames are written to and read from.
//!
//! A descriptor starting with `http:` or `https:` names a remote endpoint;
//! anything else is a local path. Local endpoints are plain files. Remote
//! endpoints put a bounded channel between the engine and a pump task that
//! drives the [`Transfer`], so a slow network never stalls frame handling
//! for longer than it takes the channel to fill.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Url;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;

use crate::error::{Result, ShattyError, TransferError};
use crate::frame::FrameSink;
use crate::transfer::{HttpTransfer, Transfer, UploadBody};

/// Default number of chunks buffered between an engine and its pump.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Where a recording lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A local file.
    File(PathBuf),
    /// A remote URL reached over HTTP.
    Remote(Url),
}

impl Endpoint {
    /// Classify and validate a descriptor.
    pub fn parse(descriptor: &str) -> std::result::Result<Self, TransferError> {
        if is_remote(descriptor) {
            let url = Url::parse(descriptor).map_err(|e| TransferError::InvalidUrl {
                url: descriptor.to_string(),
                reason: e.to_string(),
            })?;
            if url.host_str().is_none() {
                return Err(TransferError::InvalidUrl {
                    url: descriptor.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            Ok(Self::Remote(url))
        } else {
            Ok(Self::File(PathBuf::from(descriptor)))
        }
    }

    /// Whether this endpoint is reached over the network.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

fn is_remote(descriptor: &str) -> bool {
    let lower = descriptor.get(..6).unwrap_or(descriptor).to_ascii_lowercase();
    lower.starts_with("http:") || lower.starts_with("https:")
}

impl FromStr for Endpoint {
    type Err = TransferError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Tuning for remote endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointOptions {
    /// Chunks buffered between the engine and the pump task.
    pub channel_capacity: usize,
    /// Connection timeout for the transfer.
    pub connect_timeout: Duration,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Append-only destination for an encoded recording.
#[derive(Debug)]
pub struct Sink {
    target: String,
    inner: SinkInner,
}

#[derive(Debug)]
enum SinkInner {
    File(File),
    Stream {
        tx: Option<mpsc::Sender<Bytes>>,
        pump: Option<JoinHandle<std::result::Result<(), TransferError>>>,
    },
}

impl Sink {
    /// Open `endpoint` for writing. Local files are created or truncated.
    pub async fn open(endpoint: &Endpoint, options: EndpointOptions) -> Result<Self> {
        match endpoint {
            Endpoint::File(path) => {
                let file = File::create(path)
                    .await
                    .map_err(|source| ShattyError::OpenSink {
                        target: endpoint.to_string(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "opened file sink");
                Ok(Self {
                    target: endpoint.to_string(),
                    inner: SinkInner::File(file),
                })
            }
            Endpoint::Remote(url) => {
                let transfer = HttpTransfer::new(url.clone(), options.connect_timeout)?;
                Ok(Self::streamed(
                    endpoint.to_string(),
                    Arc::new(transfer),
                    options.channel_capacity,
                ))
            }
        }
    }

    /// Create a sink whose bytes are uploaded by `transfer` from a
    /// background task.
    pub fn streamed(
        target: impl Into<String>,
        transfer: Arc<dyn Transfer>,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Bytes>(capacity.max(1));
        let body: UploadBody = Box::pin(ReceiverStream::new(rx).map(Ok::<_, io::Error>));
        let pump = tokio::spawn(async move { transfer.upload(body).await });

        let target = target.into();
        tracing::debug!(endpoint = %target, capacity, "started upload pump");
        Self {
            target,
            inner: SinkInner::Stream {
                tx: Some(tx),
                pump: Some(pump),
            },
        }
    }

    /// The descriptor this sink was opened with.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Append `buf` to the recording.
    ///
    /// For streamed sinks this fails once the upload task has ended, and
    /// reports the upload's own error when it has one.
    pub async fn write(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.inner {
            SinkInner::File(file) => file.write_all(buf).await.map_err(ShattyError::Write),
            SinkInner::Stream { tx, pump } => {
                let Some(sender) = tx.as_ref() else {
                    return Err(ShattyError::Write(closed_pipe()));
                };
                if sender.send(Bytes::copy_from_slice(buf)).await.is_ok() {
                    return Ok(());
                }
                tx.take();
                Err(join_upload(pump.take()).await.err().unwrap_or_else(|| {
                    ShattyError::Write(closed_pipe())
                }))
            }
        }
    }

    /// Flush and close the sink. For streamed sinks this waits for the
    /// upload to complete.
    pub async fn finish(mut self) -> Result<()> {
        match &mut self.inner {
            SinkInner::File(file) => file.flush().await.map_err(ShattyError::Write),
            SinkInner::Stream { tx, pump } => {
                drop(tx.take());
                join_upload(pump.take()).await
            }
        }
    }
}

impl FrameSink for Sink {
    async fn append(&mut self, encoded: &[u8]) -> Result<()> {
        self.write(encoded).await
    }

    async fn flush_frames(&mut self) -> Result<()> {
        match &mut self.inner {
            SinkInner::File(file) => file.flush().await.map_err(ShattyError::Write),
            // Each write is already a complete chunk for the pump.
            SinkInner::Stream { .. } => Ok(()),
        }
    }
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "upload closed")
}

async fn join_upload(
    pump: Option<JoinHandle<std::result::Result<(), TransferError>>>,
) -> Result<()> {
    let Some(pump) = pump else {
        return Ok(());
    };
    match pump.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ShattyError::Transfer(e)),
        Err(e) => Err(ShattyError::Transfer(TransferError::TaskFailed(e.to_string()))),
    }
}

/// Readable recording, consumed front to back.
#[derive(Debug)]
pub struct Source {
    target: String,
    inner: SourceInner,
}

#[derive(Debug)]
enum SourceInner {
    File(File),
    Stream {
        reader: StreamReader<ReceiverStream<io::Result<Bytes>>, Bytes>,
        pump: Option<JoinHandle<()>>,
    },
}

impl Source {
    /// Open `endpoint` for reading.
    pub async fn open(endpoint: &Endpoint, options: EndpointOptions) -> Result<Self> {
        match endpoint {
            Endpoint::File(path) => {
                let file = File::open(path)
                    .await
                    .map_err(|source| ShattyError::OpenSource {
                        target: endpoint.to_string(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "opened file source");
                Ok(Self {
                    target: endpoint.to_string(),
                    inner: SourceInner::File(file),
                })
            }
            Endpoint::Remote(url) => {
                let transfer = HttpTransfer::new(url.clone(), options.connect_timeout)?;
                Ok(Self::streamed(
                    endpoint.to_string(),
                    Arc::new(transfer),
                    options.channel_capacity,
                ))
            }
        }
    }

    /// Create a source fed by `transfer` from a background task.
    ///
    /// A failing download is delivered to the reader as an I/O error after
    /// any chunks that arrived before it.
    pub fn streamed(
        target: impl Into<String>,
        transfer: Arc<dyn Transfer>,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(capacity.max(1));
        let target = target.into();
        let pump_target = target.clone();

        let pump = tokio::spawn(async move {
            let result = async {
                let mut stream = transfer.download().await?;
                while let Some(chunk) = stream.next().await {
                    if tx.send(Ok(chunk?)).await.is_err() {
                        // Reader is gone; nothing left to deliver to.
                        break;
                    }
                }
                Ok::<(), TransferError>(())
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(endpoint = %pump_target, error = %e, "download failed");
                let _ = tx.send(Err(io::Error::other(e))).await;
            }
        });

        tracing::debug!(endpoint = %target, capacity, "started download pump");
        Self {
            target,
            inner: SourceInner::Stream {
                reader: StreamReader::new(ReceiverStream::new(rx)),
                pump: Some(pump),
            },
        }
    }

    /// The descriptor this source was opened with.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Release the source, waiting for a download pump to wind down.
    pub async fn finish(self) -> Result<()> {
        if let SourceInner::Stream { reader, pump } = self.inner
            && let Some(pump) = pump
        {
            // Closing the channel unblocks a pump still trying to send.
            drop(reader);
            pump.await
                .map_err(|e| ShattyError::Transfer(TransferError::TaskFailed(e.to_string())))?;
        }
        Ok(())
    }
}

impl AsyncRead for Source {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            SourceInner::File(file) => Pin::new(file).poll_read(cx, buf),
            SourceInner::Stream { reader, .. } => Pin::new(reader).poll_read(cx, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_local_path() {
        assert_eq!(
            Endpoint::parse("output.shatty").unwrap(),
            Endpoint::File(PathBuf::from("output.shatty"))
        );
        assert_eq!(
            Endpoint::parse("/tmp/http:odd").unwrap(),
            Endpoint::File(PathBuf::from("/tmp/http:odd"))
        );
    }

    #[test]
    fn parse_remote_url() {
        let endpoint = Endpoint::parse("https://example.com/rec/1").unwrap();
        assert!(endpoint.is_remote());
        assert_eq!(endpoint.to_string(), "https://example.com/rec/1");

        let upper: Endpoint = "HTTP://example.com/x".parse().unwrap();
        assert!(upper.is_remote());
    }

    #[test]
    fn parse_rejects_hostless_url() {
        assert!(matches!(
            Endpoint::parse("http:"),
            Err(TransferError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn short_descriptors_are_files() {
        assert_eq!(Endpoint::parse("h").unwrap(), Endpoint::File(PathBuf::from("h")));
        assert_eq!(Endpoint::parse("").unwrap(), Endpoint::File(PathBuf::new()));
    }

    #[tokio::test]
    async fn file_sink_and_source() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::File(dir.path().join("rec.shatty"));

        let mut sink = Sink::open(&endpoint, EndpointOptions::default()).await.unwrap();
        sink.write(b"abc").await.unwrap();
        sink.write(b"def").await.unwrap();
        sink.finish().await.unwrap();

        let mut source = Source::open(&endpoint, EndpointOptions::default())
            .await
            .unwrap();
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut source, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"abcdef");
        source.finish().await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_source_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::File(dir.path().join("absent.shatty"));
        let err = Source::open(&endpoint, EndpointOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ShattyError::OpenSource { .. }));
    }
}
