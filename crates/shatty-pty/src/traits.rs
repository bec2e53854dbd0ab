//! Platform-neutral seams: the master stream, the child handle, and the
//! factory tying them together.

use std::ffi::OsStr;
use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{PtyConfig, PtySignal, WindowSize};
use crate::error::Result;
use crate::status::ExitStatus;

/// Controller end of a PTY pair.
///
/// Reads return what the child printed; writes arrive as the child's
/// keyboard input.
pub trait PtyMaster: AsyncRead + AsyncWrite + Send + Unpin {
    /// Current size of the terminal.
    fn window_size(&self) -> Result<WindowSize>;

    /// Resize the terminal. The child receives `SIGWINCH`.
    fn set_window_size(&self, size: WindowSize) -> Result<()>;

    /// `false` once [`close`](Self::close) was called.
    fn is_open(&self) -> bool;

    /// Stop using the master: reads see EOF, writes fail.
    fn close(&mut self) -> Result<()>;
}

/// The process running on the slave side.
pub trait PtyChild: Send {
    /// Process id.
    fn pid(&self) -> u32;

    /// `false` once the child was reaped.
    fn is_running(&self) -> bool;

    /// Reap the child. Later calls return the same status.
    fn wait(&mut self) -> impl Future<Output = Result<ExitStatus>> + Send;

    /// Reap the child if it has exited.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>>;

    /// Deliver `signal`.
    fn signal(&self, signal: PtySignal) -> Result<()>;

    /// `SIGKILL`.
    fn kill(&self) -> Result<()> {
        self.signal(PtySignal::Kill)
    }
}

/// Starts programs on fresh pseudo-terminals.
pub trait PtySystem {
    /// Master end produced by [`spawn`](Self::spawn).
    type Master: PtyMaster;
    /// Child handle produced by [`spawn`](Self::spawn).
    type Child: PtyChild;

    /// Allocate a PTY sized per `config` and run `program` on its slave.
    fn spawn<S, I>(
        program: S,
        args: I,
        config: &PtyConfig,
    ) -> impl Future<Output = Result<(Self::Master, Self::Child)>> + Send
    where
        S: AsRef<OsStr> + Send,
        I: IntoIterator + Send,
        I::Item: AsRef<OsStr>;
}
