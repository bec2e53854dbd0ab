//! shatty: record interactive terminal sessions and replay them with their
//! original timing.
//!
//! A recording is a flat sequence of frames, each holding a chunk of
//! terminal output and the seconds elapsed since recording started (see
//! [`frame`]). Recordings live in local files or are streamed to and from
//! HTTP endpoints (see [`endpoint`]).
//!
//! # Recording
//!
//! ```ignore
//! use shatty::{Capture, Endpoint, EndpointOptions, Sink};
//!
//! # async fn run() -> shatty::Result<()> {
//! let endpoint = Endpoint::parse("session.shatty")?;
//! let sink = Sink::open(&endpoint, EndpointOptions::default()).await?;
//! let report = Capture::new(["bash", "-l"]).run(sink).await?;
//! println!("command {}", report.exit_status);
//! # Ok(())
//! # }
//! ```
//!
//! # Playback
//!
//! ```ignore
//! use shatty::{Endpoint, EndpointOptions, Player, Source};
//!
//! # async fn run() -> shatty::Result<()> {
//! let endpoint = Endpoint::parse("session.shatty")?;
//! let source = Source::open(&endpoint, EndpointOptions::default()).await?;
//! Player::new(source).play_to(&mut tokio::io::stdout()).await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod logging;
pub mod playback;
pub mod terminal;
pub mod transfer;

pub use capture::{Capture, CaptureReport, DEFAULT_CHUNK_SIZE};
pub use config::{LogConfig, LogFormat, ShattyConfig};
pub use endpoint::{Endpoint, EndpointOptions, Sink, Source};
pub use error::{DecodeError, Result, ShattyError, TransferError};
pub use frame::{Frame, FrameReader, FrameSink, FrameWriter};
pub use playback::{PlaybackOptions, PlaybackReport, PlaybackSpeed, Player};
pub use terminal::{CrosstermTerminal, RawModeGuard, TerminalControl, TerminalMode};
pub use transfer::{HttpTransfer, Transfer};

pub use shatty_pty::ExitStatus;
