//! The recording wire format.
//!
//! A recording is a bare sequence of frames, big-endian throughout:
//!
//! ```text
//! Recording := Frame*
//! Frame     := offset:f64 (8 bytes) length:u32 (4 bytes) payload:[u8; length]
//! ```
//!
//! There is no magic number, version or trailer. The end of a recording is
//! the end of its source.

use std::future::Future;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DecodeError, Result, ShattyError};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 12;

/// Upper bound on the initial payload allocation, so a corrupt length field
/// cannot request gigabytes up front.
const MAX_PREALLOC: usize = 64 * 1024;

/// One timestamped chunk of terminal output.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Seconds since the start of the recording.
    pub offset: f64,
    /// The bytes the session produced.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(offset: f64, payload: impl Into<Bytes>) -> Self {
        Self {
            offset,
            payload: payload.into(),
        }
    }

    /// Length of this frame on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode this frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        encode(self.offset, &self.payload)
    }
}

/// Encode a frame. `payload.len()` must fit in a `u32`.
#[must_use]
pub fn encode(offset: f64, payload: &[u8]) -> Bytes {
    debug_assert!(u32::try_from(payload.len()).is_ok());
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_f64(offset);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode the next frame from `source`.
///
/// Returns `Ok(None)` when the source is exhausted exactly on a frame
/// boundary. After an error the source position is unspecified and the
/// recording must be abandoned.
pub async fn decode<R>(source: &mut R) -> std::result::Result<Option<Frame>, DecodeError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let read = read_full(source, &mut header).await?;
    match read {
        0 => return Ok(None),
        HEADER_LEN => {}
        partial => return Err(DecodeError::TruncatedHeader { read: partial }),
    }

    let mut fields = &header[..];
    let offset = fields.get_f64();
    let len = fields.get_u32();

    let mut payload = Vec::with_capacity((len as usize).min(MAX_PREALLOC));
    let read = (&mut *source)
        .take(u64::from(len))
        .read_to_end(&mut payload)
        .await?;
    if read < len as usize {
        return Err(DecodeError::TruncatedPayload {
            expected: len,
            read,
        });
    }

    Ok(Some(Frame::new(offset, payload)))
}

/// Read until `buf` is full or the source ends, returning the count read.
async fn read_full<R>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads frames from a source one at a time.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    frames: u64,
    bytes: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a source.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            frames: 0,
            bytes: 0,
        }
    }

    /// Decode the next frame, or `None` at the end of the recording.
    pub async fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        let frame = decode(&mut self.inner).await?;
        if let Some(ref frame) = frame {
            self.frames += 1;
            self.bytes += frame.payload.len() as u64;
        }
        Ok(frame)
    }

    /// Decode every remaining frame.
    pub async fn read_all(&mut self) -> std::result::Result<Vec<Frame>, DecodeError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame().await? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Frames decoded so far.
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Payload bytes decoded so far.
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Unwrap the source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Destination for encoded frames.
///
/// Every `AsyncWrite` is one; [`Sink`](crate::Sink) is another, so the
/// capture engine can frame straight onto a file or an upload.
pub trait FrameSink {
    /// Append one encoded frame.
    fn append(&mut self, encoded: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Push anything buffered towards the destination.
    fn flush_frames(&mut self) -> impl Future<Output = Result<()>> + Send;
}

impl<W: AsyncWrite + Unpin + Send> FrameSink for W {
    async fn append(&mut self, encoded: &[u8]) -> Result<()> {
        self.write_all(encoded).await.map_err(ShattyError::Write)
    }

    async fn flush_frames(&mut self) -> Result<()> {
        AsyncWriteExt::flush(self).await.map_err(ShattyError::Write)
    }
}

/// Encodes frames onto a [`FrameSink`], counting what it wrote.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    frames: u64,
    bytes: u64,
}

impl<W: FrameSink> FrameWriter<W> {
    /// Wrap a sink.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            frames: 0,
            bytes: 0,
        }
    }

    /// Encode and write one frame.
    ///
    /// Payloads longer than `u32::MAX` fail with
    /// [`ShattyError::FrameTooLarge`] and nothing is written.
    pub async fn write_frame(&mut self, offset: f64, payload: &[u8]) -> Result<()> {
        if u32::try_from(payload.len()).is_err() {
            return Err(ShattyError::FrameTooLarge { len: payload.len() });
        }
        self.inner.append(&encode(offset, payload)).await?;
        self.frames += 1;
        self.bytes += payload.len() as u64;
        Ok(())
    }

    /// Flush the underlying sink.
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush_frames().await
    }

    /// Frames written so far.
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Payload bytes written so far.
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
