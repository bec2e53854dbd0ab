//! Starting a program on a PTY slave and supervising it.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;

use rustix::process::{Pid, Signal};
use tokio::process::{Child, Command};

use crate::config::{PtyConfig, PtySignal};
use crate::error::{PtyError, Result, errno_to_io};
use crate::status::ExitStatus;
use crate::traits::PtyChild;

/// A process whose stdio is a PTY slave.
#[derive(Debug)]
pub struct UnixPtyChild {
    child: Child,
    pid: u32,
    status: Option<ExitStatus>,
}

impl UnixPtyChild {
    fn reaped(&mut self, status: std::process::ExitStatus) -> ExitStatus {
        *self.status.get_or_insert(ExitStatus::from(status))
    }
}

impl PtyChild for UnixPtyChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_running(&self) -> bool {
        self.status.is_none()
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await.map_err(PtyError::Wait)?;
        Ok(self.reaped(status))
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        let status = self.child.try_wait().map_err(PtyError::Wait)?;
        Ok(status.map(|status| self.reaped(status)))
    }

    fn signal(&self, signal: PtySignal) -> Result<()> {
        if self.status.is_some() {
            return Err(PtyError::NotRunning { pid: self.pid });
        }
        let invalid =
            |what: &str| PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, what));

        let pid = i32::try_from(self.pid)
            .ok()
            .and_then(Pid::from_raw)
            .ok_or_else(|| invalid("pid out of range"))?;
        let signal =
            Signal::from_named_raw(signal.number()).ok_or_else(|| invalid("unknown signal"))?;
        rustix::process::kill_process(pid, signal).map_err(|e| PtyError::Signal(errno_to_io(e)))
    }
}

/// Run `program` with `slave` as stdin, stdout and stderr.
///
/// The parent's copy of `slave` is closed before returning, so the master
/// reports `EIO` as soon as the child and its descendants are gone.
pub fn spawn_on_slave<S, I>(
    slave: OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .env_clear()
        .envs(config.child_env())
        .kill_on_drop(false);
    if let Some(dir) = &config.working_directory {
        command.current_dir(dir);
    }

    // `try_clone` keeps FD_CLOEXEC, so only this child ever inherits them.
    let stdio = || slave.try_clone().map(Stdio::from).map_err(PtyError::Spawn);
    command.stdin(stdio()?).stdout(stdio()?).stderr(stdio()?);

    if config.controlling_terminal {
        // SAFETY: only async-signal-safe calls; fd 0 is the slave by now.
        #[allow(unsafe_code)]
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() < 0 || libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = command.spawn().map_err(PtyError::Spawn)?;
    drop(command);
    drop(slave);

    let pid = child.id().ok_or_else(|| {
        PtyError::Spawn(io::Error::other("child was reaped before start-up finished"))
    })?;
    Ok(UnixPtyChild {
        child,
        pid,
        status: None,
    })
}
