//! The capture engine.
//!
//! A capture owns one interactive session for its whole life:
//!
//! 1. note the start time and put our terminal into raw mode
//! 2. spawn the command on a fresh PTY
//! 3. forward our stdin to the session from a separate task
//! 4. read session output in chunks, stamping each with the seconds elapsed
//!    since start, writing it as a frame and echoing it to our stdout
//! 5. when the PTY reports its peer gone, reap the child and stop
//!
//! The raw-mode guard restores the terminal on every way out, including
//! errors.

use std::ffi::OsString;
use std::time::{Duration, Instant};

use shatty_pty::{
    ExitStatus, NativePtySystem, PtyChild, PtyConfig, PtySignal, PtySystem, is_peer_closed,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::endpoint::Sink;
use crate::error::{Result, ShattyError};
use crate::frame::{FrameSink, FrameWriter};
use crate::terminal::{CrosstermTerminal, RawModeGuard, TerminalControl, terminal_size};

/// Largest chunk read from the session in one go.
pub const DEFAULT_CHUNK_SIZE: usize = 16384;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outcome of a completed capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureReport {
    /// How the captured command exited.
    pub exit_status: ExitStatus,
    /// Frames written.
    pub frames: u64,
    /// Payload bytes written.
    pub bytes: u64,
    /// Wall time from start to the session ending.
    pub elapsed: Duration,
}

/// Records one command's terminal output.
pub struct Capture {
    command: Vec<OsString>,
    headless: bool,
    chunk_size: usize,
    pty_config: PtyConfig,
    terminal: Box<dyn TerminalControl>,
    input: BoxedReader,
    echo: BoxedWriter,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("command", &self.command)
            .field("headless", &self.headless)
            .field("chunk_size", &self.chunk_size)
            .field("pty_config", &self.pty_config)
            .finish_non_exhaustive()
    }
}

impl Capture {
    /// Prepare to record `command` (program followed by its arguments).
    ///
    /// Defaults: our stdin is forwarded, output is echoed to our stdout,
    /// the PTY takes our terminal's size, and our terminal goes raw.
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let size = terminal_size();
        Self {
            command: command.into_iter().map(Into::into).collect(),
            headless: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pty_config: PtyConfig::builder().window_size(size.cols, size.rows).build(),
            terminal: Box::new(CrosstermTerminal::new()),
            input: Box::new(tokio::io::stdin()),
            echo: Box::new(tokio::io::stdout()),
        }
    }

    /// Suppress the live echo of session output.
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Maximum bytes per frame. Clamped to `1..=u32::MAX`.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, u32::MAX as usize);
        self
    }

    /// PTY settings for the spawned command.
    #[must_use]
    pub fn pty_config(mut self, config: PtyConfig) -> Self {
        self.pty_config = config;
        self
    }

    /// Terminal whose mode is switched for the duration of the capture.
    #[must_use]
    pub fn terminal(mut self, terminal: Box<dyn TerminalControl>) -> Self {
        self.terminal = terminal;
        self
    }

    /// Where keystrokes for the session come from.
    #[must_use]
    pub fn input(mut self, input: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    /// Where session output is echoed.
    #[must_use]
    pub fn echo(mut self, echo: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.echo = Box::new(echo);
        self
    }

    /// Run the command to completion, writing its output to `sink`.
    pub async fn run(self, sink: Sink) -> Result<CaptureReport> {
        let Self {
            command,
            headless,
            chunk_size,
            pty_config,
            terminal,
            input,
            echo,
        } = self;

        let (program, args) = command.split_first().ok_or(ShattyError::EmptyCommand)?;

        let start = Instant::now();
        let guard = RawModeGuard::acquire(terminal).map_err(ShattyError::Terminal)?;

        let (master, child) = NativePtySystem::spawn(program, args, &pty_config)
            .await
            .map_err(|source| ShattyError::Spawn {
                command: program.to_string_lossy().into_owned(),
                source,
            })?;
        tracing::debug!(pid = child.pid(), sink = sink.target(), "capture started");

        let session = Session {
            master,
            child,
            guard,
        };
        let settings = LoopSettings {
            start,
            chunk_size,
            headless,
        };
        drive(session, FrameWriter::new(sink), input, echo, &settings).await
    }
}

/// A spawned command plus the terminal mode to restore when it is done.
struct Session<M, C> {
    master: M,
    child: C,
    guard: RawModeGuard,
}

struct LoopSettings {
    start: Instant,
    chunk_size: usize,
    headless: bool,
}

/// Record `session` until its output ends, then reap it and close `frames`.
///
/// On a fatal error the child is sent `SIGHUP`; the guard restores the
/// terminal as the session drops.
async fn drive<M, C>(
    session: Session<M, C>,
    mut frames: FrameWriter<Sink>,
    input: BoxedReader,
    mut echo: BoxedWriter,
    settings: &LoopSettings,
) -> Result<CaptureReport>
where
    M: AsyncRead + AsyncWrite + Send + 'static,
    C: PtyChild,
{
    let Session {
        master,
        mut child,
        guard,
    } = session;

    let (mut output, session_input) = tokio::io::split(master);
    let forwarder = tokio::spawn(forward_input(input, session_input));

    if let Err(e) = capture_loop(&mut output, &mut frames, &mut echo, settings).await {
        forwarder.abort();
        if let Err(signal_err) = child.signal(PtySignal::Hangup) {
            tracing::debug!(error = %signal_err, "could not hang up child");
        }
        return Err(e);
    }

    let exit_status = child.wait().await.map_err(ShattyError::Wait)?;
    forwarder.abort();
    let (frame_count, byte_count) = (frames.frames(), frames.bytes());
    frames.into_inner().finish().await?;
    guard.release().map_err(ShattyError::Terminal)?;

    let report = CaptureReport {
        exit_status,
        frames: frame_count,
        bytes: byte_count,
        elapsed: settings.start.elapsed(),
    };
    tracing::debug!(
        status = %report.exit_status,
        frames = report.frames,
        bytes = report.bytes,
        "capture finished"
    );
    Ok(report)
}

async fn capture_loop<R, S, E>(
    output: &mut R,
    frames: &mut FrameWriter<S>,
    echo: &mut E,
    settings: &LoopSettings,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: FrameSink,
    E: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; settings.chunk_size];

    loop {
        let n = match output.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("session output reached EOF");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if is_peer_closed(&e) => {
                tracing::debug!("session peer closed");
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ShattyError::Read(e)),
        };

        let chunk = &buf[..n];
        frames
            .write_frame(settings.start.elapsed().as_secs_f64(), chunk)
            .await?;

        if !settings.headless {
            echo.write_all(chunk).await.map_err(ShattyError::Write)?;
            echo.flush().await.map_err(ShattyError::Write)?;
        }
    }
}

/// Copy `input` into the session until either side closes.
///
/// Failures only end forwarding; they never affect the recording.
async fn forward_input<R, W>(mut input: R, mut session: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("input closed; forwarding stopped");
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "reading input failed; forwarding stopped");
                return;
            }
        };

        if let Err(e) = session.write_all(&buf[..n]).await {
            tracing::debug!(error = %e, "session input closed; forwarding stopped");
            return;
        }
    }
}
