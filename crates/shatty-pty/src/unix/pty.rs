//! Master side of a Unix PTY.
//!
//! The master is opened non-blocking and close-on-exec, then driven by
//! Tokio's reactor through `AsyncFd`.

use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use rustix::fs::{Mode, OFlags};
use rustix::io::FdFlags;
use rustix::pty::OpenptFlags;
use rustix::termios::Winsize;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::PtyMaster;

/// Non-blocking master descriptor registered with the Tokio reactor.
#[derive(Debug)]
pub struct UnixPtyMaster {
    fd: AsyncFd<OwnedFd>,
    closed: bool,
}

impl UnixPtyMaster {
    /// Allocate a PTY pair. Returns the master and the slave device path.
    ///
    /// Must run inside a Tokio runtime.
    pub fn open() -> Result<(Self, PathBuf)> {
        let create = |errno| PtyError::Create(errno_to_io(errno));

        let fd = rustix::pty::openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(create)?;
        rustix::io::fcntl_setfd(&fd, FdFlags::CLOEXEC).map_err(create)?;
        rustix::pty::grantpt(&fd).map_err(create)?;
        rustix::pty::unlockpt(&fd).map_err(create)?;
        let name = rustix::pty::ptsname(&fd, Vec::new()).map_err(create)?;
        rustix::fs::fcntl_setfl(&fd, OFlags::NONBLOCK).map_err(create)?;

        let slave = PathBuf::from(OsString::from_vec(name.into_bytes()));
        let fd = AsyncFd::new(fd).map_err(PtyError::Create)?;
        Ok((Self { fd, closed: false }, slave))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(PtyError::Closed)
        } else {
            Ok(())
        }
    }
}

impl PtyMaster for UnixPtyMaster {
    fn window_size(&self) -> Result<WindowSize> {
        self.ensure_open()?;
        let ws = rustix::termios::tcgetwinsize(self.fd.get_ref())
            .map_err(|e| PtyError::GetAttributes(errno_to_io(e)))?;
        Ok(WindowSize::new(ws.ws_col, ws.ws_row))
    }

    fn set_window_size(&self, size: WindowSize) -> Result<()> {
        self.ensure_open()?;
        let ws = Winsize {
            ws_row: size.rows,
            ws_col: size.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        rustix::termios::tcsetwinsize(self.fd.get_ref(), ws)
            .map_err(|e| PtyError::Resize(errno_to_io(e)))
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsyncRead for UnixPtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.closed {
            return Poll::Ready(Ok(()));
        }
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            // EIO after the last slave descriptor closes is passed through
            // untouched for `is_peer_closed`.
            let result =
                guard.try_io(|fd| rustix::io::read(fd.get_ref(), unfilled).map_err(errno_to_io));
            match result {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => {}
            }
        }
    }
}

impl AsyncWrite for UnixPtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|fd| rustix::io::write(fd.get_ref(), buf).map_err(errno_to_io)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => {}
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().closed = true;
        Poll::Ready(Ok(()))
    }
}

/// Open the slave device, close-on-exec and without becoming its
/// controlling process.
pub fn open_slave(path: &Path) -> Result<OwnedFd> {
    rustix::fs::open(
        path,
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::Create(errno_to_io(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slave_path_is_a_device() {
        let Ok((master, slave)) = UnixPtyMaster::open() else {
            return;
        };
        assert!(master.is_open());
        assert!(slave.starts_with("/dev"));
        assert!(open_slave(&slave).is_ok());
    }

    #[tokio::test]
    async fn resize_is_visible() {
        let Ok((master, _)) = UnixPtyMaster::open() else {
            return;
        };
        master.set_window_size(WindowSize::new(100, 30)).unwrap();
        assert_eq!(master.window_size().unwrap(), WindowSize::new(100, 30));
    }

    #[tokio::test]
    async fn close_disables_the_master() {
        let Ok((mut master, _)) = UnixPtyMaster::open() else {
            return;
        };
        master.close().unwrap();
        assert!(!master.is_open());
        assert!(matches!(master.window_size(), Err(PtyError::Closed)));

        let mut buf = [0u8; 8];
        let n = tokio::io::AsyncReadExt::read(&mut master, &mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
