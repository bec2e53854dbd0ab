//! How a command is started on a new PTY.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Columns.
    pub cols: u16,
    /// Rows.
    pub rows: u16,
}

impl WindowSize {
    /// A `cols` x `rows` window.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// A change applied to the child's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    /// Set a variable.
    Set(OsString, OsString),
    /// Remove a variable.
    Unset(OsString),
}

/// Spawn settings for [`PtySystem::spawn`](crate::PtySystem::spawn).
///
/// ```
/// use shatty_pty::{PtyConfig, WindowSize};
///
/// let config = PtyConfig::builder()
///     .window_size(132, 43)
///     .set_env("TERM", "xterm-256color")
///     .build();
/// assert_eq!(config.window_size, WindowSize::new(132, 43));
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Initial size of the terminal.
    pub window_size: WindowSize,
    /// Directory the child starts in. `None` keeps ours.
    pub working_directory: Option<PathBuf>,
    /// Start from our environment rather than an empty one.
    pub inherit_env: bool,
    /// Changes applied in order on top of the base environment.
    pub env_changes: Vec<EnvChange>,
    /// Put the child in a new session with the slave as its controlling
    /// terminal. Shells need this for job control and for `SIGHUP` on hangup.
    pub controlling_terminal: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            window_size: WindowSize::default(),
            working_directory: None,
            inherit_env: true,
            env_changes: Vec::new(),
            controlling_terminal: true,
        }
    }
}

impl PtyConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::default()
    }

    /// The environment the child will see.
    #[must_use]
    pub fn child_env(&self) -> BTreeMap<OsString, OsString> {
        let mut env: BTreeMap<_, _> = if self.inherit_env {
            std::env::vars_os().collect()
        } else {
            BTreeMap::new()
        };
        for change in &self.env_changes {
            match change {
                EnvChange::Set(key, value) => {
                    env.insert(key.clone(), value.clone());
                }
                EnvChange::Unset(key) => {
                    env.remove(key);
                }
            }
        }
        env
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Initial terminal size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.config.window_size = WindowSize::new(cols, rows);
        self
    }

    /// Directory the child starts in.
    #[must_use]
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(dir.into());
        self
    }

    /// Do not inherit our environment.
    #[must_use]
    pub const fn clean_env(mut self) -> Self {
        self.config.inherit_env = false;
        self
    }

    /// Set `key` in the child's environment.
    #[must_use]
    pub fn set_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config
            .env_changes
            .push(EnvChange::Set(key.into(), value.into()));
        self
    }

    /// Remove `key` from the child's environment.
    #[must_use]
    pub fn unset_env(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_changes.push(EnvChange::Unset(key.into()));
        self
    }

    /// Whether the slave becomes the child's controlling terminal.
    #[must_use]
    pub const fn controlling_terminal(mut self, enabled: bool) -> Self {
        self.config.controlling_terminal = enabled;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Signals the recorder sends to a captured command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PtySignal {
    /// `SIGHUP`: the terminal went away.
    Hangup,
    /// `SIGINT`.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
    /// `SIGKILL`.
    Kill,
}

impl PtySignal {
    /// Signal number on this platform.
    #[cfg(unix)]
    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Hangup => libc::SIGHUP,
            Self::Interrupt => libc::SIGINT,
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }

    /// Conventional name, e.g. `SIGHUP`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for PtySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = PtyConfig::builder()
            .window_size(120, 40)
            .working_directory("/tmp")
            .controlling_terminal(false)
            .build();

        assert_eq!(config.window_size, WindowSize::new(120, 40));
        assert_eq!(config.working_directory, Some(PathBuf::from("/tmp")));
        assert!(!config.controlling_terminal);
        assert!(config.inherit_env);
    }

    #[test]
    fn env_changes_apply_in_order() {
        let config = PtyConfig::builder()
            .clean_env()
            .set_env("A", "1")
            .set_env("B", "2")
            .unset_env("B")
            .set_env("A", "3")
            .build();

        let env = config.child_env();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get(&OsString::from("A")), Some(&OsString::from("3")));
    }

    #[test]
    fn window_size_display() {
        assert_eq!(WindowSize::default().to_string(), "80x24");
    }

    #[cfg(unix)]
    #[test]
    fn signal_numbers_and_names() {
        assert_eq!(PtySignal::Hangup.number(), libc::SIGHUP);
        assert_eq!(PtySignal::Kill.to_string(), "SIGKILL");
    }
}
