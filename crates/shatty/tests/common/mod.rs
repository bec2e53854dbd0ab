//! Shared test doubles.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::StreamExt;
use shatty::TransferError;
use shatty::terminal::{TerminalControl, TerminalMode};
use shatty::transfer::{DownloadStream, Transfer, TransferFuture, UploadBody};
use tokio::io::AsyncWrite;

/// In-memory [`Transfer`]: uploads are collected, downloads replay fixed
/// chunks, and either direction can be made to fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransfer {
    pub uploaded: Arc<Mutex<Vec<u8>>>,
    pub download_chunks: Vec<Bytes>,
    pub fail_upload: Option<u16>,
    pub fail_download_after_chunks: bool,
}

impl MemoryTransfer {
    pub fn serving(data: &[u8], chunk_len: usize) -> Self {
        Self {
            download_chunks: data
                .chunks(chunk_len)
                .map(Bytes::copy_from_slice)
                .collect(),
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<u8> {
        self.uploaded.lock().unwrap().clone()
    }
}

impl Transfer for MemoryTransfer {
    fn upload(&self, mut body: UploadBody) -> TransferFuture<'_, ()> {
        Box::pin(async move {
            if let Some(status) = self.fail_upload {
                return Err(TransferError::Status { status });
            }
            while let Some(chunk) = body.next().await {
                self.uploaded.lock().unwrap().extend_from_slice(&chunk?);
            }
            Ok(())
        })
    }

    fn download(&self) -> TransferFuture<'_, DownloadStream> {
        let mut items: Vec<io::Result<Bytes>> =
            self.download_chunks.iter().cloned().map(Ok).collect();
        if self.fail_download_after_chunks {
            items.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        Box::pin(async move { Ok(Box::pin(futures::stream::iter(items)) as DownloadStream) })
    }
}

/// Terminal double that records every real mode switch.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerminal {
    mode: Option<TerminalMode>,
    pub switches: Arc<Mutex<Vec<TerminalMode>>>,
}

impl RecordingTerminal {
    pub fn switches(&self) -> Vec<TerminalMode> {
        self.switches.lock().unwrap().clone()
    }
}

impl TerminalControl for RecordingTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if self.mode != Some(TerminalMode::Raw) {
            self.mode = Some(TerminalMode::Raw);
            self.switches.lock().unwrap().push(TerminalMode::Raw);
        }
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        if self.mode == Some(TerminalMode::Raw) {
            self.mode = Some(TerminalMode::Cooked);
            self.switches.lock().unwrap().push(TerminalMode::Cooked);
        }
        Ok(())
    }

    fn mode(&self) -> TerminalMode {
        self.mode.unwrap_or(TerminalMode::Cooked)
    }
}

/// Writer whose contents stay reachable after it is moved away.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
