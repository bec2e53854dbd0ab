//! Exit status of a process that ran on a PTY.

use std::fmt;

/// How a child on the PTY ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// Normal exit with a status code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// `true` for `Exited(0)` only.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// The exit code, or `None` if a signal ended the process.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        if let Self::Exited(code) = *self {
            Some(code)
        } else {
            None
        }
    }

    /// The fatal signal, or `None` after a normal exit.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        if let Self::Signaled(signal) = *self {
            Some(signal)
        } else {
            None
        }
    }
}

#[cfg(unix)]
impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            // Stopped or continued; `wait` never reports these.
            (None, None) => Self::Exited(-1),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert!(ExitStatus::Exited(0).success());
        assert!(!ExitStatus::Exited(2).success());
        assert!(!ExitStatus::Signaled(9).success());
        assert_eq!(ExitStatus::Exited(2).code(), Some(2));
        assert_eq!(ExitStatus::Exited(2).signal(), None);
        assert_eq!(ExitStatus::Signaled(15).signal(), Some(15));
        assert_eq!(ExitStatus::Signaled(15).code(), None);
    }

    #[test]
    fn display() {
        assert_eq!(ExitStatus::Exited(3).to_string(), "exited with code 3");
        assert_eq!(ExitStatus::Signaled(1).to_string(), "terminated by signal 1");
    }

    #[cfg(unix)]
    #[test]
    fn from_std_status() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait statuses: exit code in the high byte, signal in the low bits.
        assert_eq!(
            ExitStatus::from(std::process::ExitStatus::from_raw(5 << 8)),
            ExitStatus::Exited(5)
        );
        assert_eq!(
            ExitStatus::from(std::process::ExitStatus::from_raw(libc::SIGHUP)),
            ExitStatus::Signaled(libc::SIGHUP)
        );
    }
}
