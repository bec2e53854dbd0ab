//! Controlling-terminal modes for the recorder.
//!
//! While recording, our own terminal is put into raw mode so keystrokes
//! reach the captured session unbuffered and its output reaches the screen
//! unprocessed. [`RawModeGuard`] ties the restore to scope exit so every
//! path out of a capture leaves the terminal usable.

use std::io;

use crossterm::tty::IsTty;

/// Terminal line discipline as far as the recorder cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// No echo, no line buffering, no output processing.
    Raw,
    /// Whatever mode the terminal was in before we touched it.
    Cooked,
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Raw-mode switching for the recorder's controlling terminal.
///
/// Both operations are idempotent.
pub trait TerminalControl: Send {
    /// Switch to raw mode.
    fn enter_raw_mode(&mut self) -> io::Result<()>;

    /// Restore the mode that was active before [`enter_raw_mode`].
    ///
    /// [`enter_raw_mode`]: TerminalControl::enter_raw_mode
    fn restore_mode(&mut self) -> io::Result<()>;

    /// The current mode.
    fn mode(&self) -> TerminalMode;

    /// Whether the terminal is currently raw.
    fn is_raw(&self) -> bool {
        self.mode() == TerminalMode::Raw
    }
}

/// [`TerminalControl`] backed by crossterm.
///
/// When stdin is not a terminal (pipes, CI) mode switches are tracked but
/// never reach the OS.
#[derive(Debug)]
pub struct CrosstermTerminal {
    mode: TerminalMode,
    attached: bool,
}

impl CrosstermTerminal {
    /// Control the terminal on stdin, if there is one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: TerminalMode::Cooked,
            attached: is_tty(),
        }
    }

    /// A terminal handle that never changes the real terminal.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            mode: TerminalMode::Cooked,
            attached: false,
        }
    }

    /// Whether mode changes reach a real terminal.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Default for CrosstermTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalControl for CrosstermTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if self.mode == TerminalMode::Raw {
            return Ok(());
        }
        if self.attached {
            crossterm::terminal::enable_raw_mode()?;
        }
        self.mode = TerminalMode::Raw;
        tracing::debug!(attached = self.attached, "entered raw mode");
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        if self.mode == TerminalMode::Cooked {
            return Ok(());
        }
        if self.attached {
            crossterm::terminal::disable_raw_mode()?;
        }
        self.mode = TerminalMode::Cooked;
        tracing::debug!(attached = self.attached, "restored terminal mode");
        Ok(())
    }

    fn mode(&self) -> TerminalMode {
        self.mode
    }
}

/// Holds a terminal in raw mode until dropped or released.
pub struct RawModeGuard {
    terminal: Box<dyn TerminalControl>,
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("mode", &self.terminal.mode())
            .finish()
    }
}

impl RawModeGuard {
    /// Put `terminal` into raw mode.
    ///
    /// If switching fails the terminal is restored before the error is
    /// returned.
    pub fn acquire(mut terminal: Box<dyn TerminalControl>) -> io::Result<Self> {
        if let Err(e) = terminal.enter_raw_mode() {
            let _ = terminal.restore_mode();
            return Err(e);
        }
        Ok(Self { terminal })
    }

    /// The mode the guarded terminal is in.
    #[must_use]
    pub fn mode(&self) -> TerminalMode {
        self.terminal.mode()
    }

    /// Restore the terminal now, reporting any failure.
    pub fn release(mut self) -> io::Result<()> {
        self.terminal.restore_mode()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.restore_mode() {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

/// Check if stdin is a TTY.
#[must_use]
pub fn is_tty() -> bool {
    io::stdin().is_tty()
}

/// Size of the controlling terminal.
///
/// Falls back to `COLUMNS`/`LINES`, then 80x24.
#[must_use]
pub fn terminal_size() -> TerminalSize {
    if let Ok((cols, rows)) = crossterm::terminal::size()
        && cols > 0
        && rows > 0
    {
        return TerminalSize { cols, rows };
    }

    let from_env = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|&v| v > 0)
    };
    let default = TerminalSize::default();
    TerminalSize {
        cols: from_env("COLUMNS").unwrap_or(default.cols),
        rows: from_env("LINES").unwrap_or(default.rows),
    }
}
