//! Error type shared by every PTY operation.

use std::io;

/// Everything that can go wrong between allocating a PTY and reaping its child.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// `openpt`, `grantpt`, `unlockpt` or opening the slave failed.
    #[error("cannot allocate pseudo-terminal: {0}")]
    Create(#[source] io::Error),

    /// The program could not be executed on the slave.
    #[error("cannot start child on pseudo-terminal: {0}")]
    Spawn(#[source] io::Error),

    /// Master I/O failed.
    #[error("pseudo-terminal I/O: {0}")]
    Io(#[from] io::Error),

    /// `TIOCSWINSZ` failed.
    #[error("cannot set window size: {0}")]
    Resize(#[source] io::Error),

    /// `TIOCGWINSZ` failed.
    #[error("cannot query window size: {0}")]
    GetAttributes(#[source] io::Error),

    /// The master was closed with [`PtyMaster::close`](crate::PtyMaster::close).
    #[error("pseudo-terminal is closed")]
    Closed,

    /// The child was already reaped.
    #[error("process {pid} is no longer running")]
    NotRunning {
        /// The reaped child's pid.
        pid: u32,
    },

    /// `kill(2)` failed.
    #[error("cannot signal child: {0}")]
    Signal(#[source] io::Error),

    /// `waitpid` failed.
    #[error("cannot reap child: {0}")]
    Wait(#[source] io::Error),
}

/// Result alias used across this crate.
pub type Result<T, E = PtyError> = std::result::Result<T, E>;

#[cfg(unix)]
pub(crate) fn errno_to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(unix)]
impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(errno_to_io(errno))
    }
}
