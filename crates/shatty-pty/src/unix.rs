//! Unix backend: `posix_openpt` allocation, a reactor-driven master and a
//! child that owns the slave as its controlling terminal.

mod child;
mod pty;

use std::ffi::OsStr;

pub use child::{UnixPtyChild, spawn_on_slave};
pub use pty::{UnixPtyMaster, open_slave};

use crate::config::PtyConfig;
use crate::error::Result;
use crate::traits::{PtyChild, PtyMaster, PtySystem};

/// [`PtySystem`] for Linux, macOS and the BSDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPtySystem;

impl PtySystem for UnixPtySystem {
    type Master = UnixPtyMaster;
    type Child = UnixPtyChild;

    async fn spawn<S, I>(
        program: S,
        args: I,
        config: &PtyConfig,
    ) -> Result<(UnixPtyMaster, UnixPtyChild)>
    where
        S: AsRef<OsStr> + Send,
        I: IntoIterator + Send,
        I::Item: AsRef<OsStr>,
    {
        let (master, slave_path) = UnixPtyMaster::open()?;
        master.set_window_size(config.window_size)?;
        let slave = open_slave(&slave_path)?;
        let child = spawn_on_slave(slave, program, args, config)?;

        tracing::debug!(
            pid = child.pid(),
            slave = %slave_path.display(),
            size = %config.window_size,
            "child started on pty"
        );
        Ok((master, child))
    }
}

/// The backend for the current platform.
pub type NativePtySystem = UnixPtySystem;
