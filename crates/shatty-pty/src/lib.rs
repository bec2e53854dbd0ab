//! Pseudo-terminals for Tokio.
//!
//! [`PtySystem::spawn`] allocates a PTY, starts a program on its slave side
//! and hands back the master as an `AsyncRead + AsyncWrite` stream plus a
//! [`PtyChild`] handle for reaping and signalling.
//!
//! ```no_run
//! use shatty_pty::{NativePtySystem, PtyChild, PtyConfig, PtySystem, is_peer_closed};
//! use tokio::io::AsyncReadExt;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut master, mut child) =
//!     NativePtySystem::spawn("ls", ["-l"], &PtyConfig::default()).await?;
//!
//! let mut output = Vec::new();
//! let mut buf = [0u8; 4096];
//! loop {
//!     match master.read(&mut buf).await {
//!         Ok(0) => break,
//!         Ok(n) => output.extend_from_slice(&buf[..n]),
//!         Err(e) if is_peer_closed(&e) => break,
//!         Err(e) => return Err(e.into()),
//!     }
//! }
//! println!("ls {}", child.wait().await?);
//! # Ok(())
//! # }
//! ```
//!
//! Only the child holds the slave open. When it and everything it forked
//! have exited, master reads fail with `EIO`, which [`is_peer_closed`]
//! identifies as an ordinary end of session.

pub mod config;
pub mod error;
pub mod status;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use config::{EnvChange, PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use status::ExitStatus;
pub use traits::{PtyChild, PtyMaster, PtySystem};

#[cfg(unix)]
pub use unix::{NativePtySystem, UnixPtyChild, UnixPtyMaster, UnixPtySystem};

/// Whether a master read failed only because the slave side hung up.
#[must_use]
pub fn is_peer_closed(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EIO)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn defaults() {
        let config = PtyConfig::default();
        assert_eq!(config.window_size, WindowSize::new(80, 24));
        assert!(config.controlling_terminal);
        assert!(config.inherit_env);
    }

    #[cfg(unix)]
    #[test]
    fn only_eio_means_hangup() {
        assert!(is_peer_closed(&io::Error::from_raw_os_error(libc::EIO)));
        assert!(!is_peer_closed(&io::Error::from_raw_os_error(libc::EBADF)));
        assert!(!is_peer_closed(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
