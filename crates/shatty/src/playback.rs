//! Timed replay of recordings.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, ShattyError};
use crate::frame::{Frame, FrameReader};

/// Playback speed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlaybackSpeed {
    /// Original timing.
    #[default]
    Realtime,
    /// Delays divided by the factor; `2.0` plays twice as fast.
    Factor(f64),
    /// No delays at all.
    Instant,
}

impl PlaybackSpeed {
    /// Interpret a speed multiplier: `0` means instant, `1` real time.
    ///
    /// Negative or non-finite multipliers are treated as instant.
    #[must_use]
    pub fn from_multiplier(multiplier: f64) -> Self {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            Self::Instant
        } else if (multiplier - 1.0).abs() < f64::EPSILON {
            Self::Realtime
        } else {
            Self::Factor(multiplier)
        }
    }

    /// Wall-clock wait for a gap of `seconds` in the recording.
    #[must_use]
    pub fn scale(self, seconds: f64) -> Duration {
        let seconds = match self {
            Self::Realtime => seconds,
            Self::Factor(factor) if factor.is_finite() && factor > 0.0 => seconds / factor,
            Self::Factor(_) | Self::Instant => return Duration::ZERO,
        };
        if seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

/// Playback options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackOptions {
    /// Playback speed.
    pub speed: PlaybackSpeed,
}

impl PlaybackOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set playback speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = speed;
        self
    }
}

/// Summary of a finished playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    /// Frames replayed.
    pub frames: u64,
    /// Payload bytes written.
    pub bytes: u64,
}

/// Replays a recording from any byte source.
#[derive(Debug)]
pub struct Player<R> {
    reader: FrameReader<R>,
    options: PlaybackOptions,
    last_offset: f64,
}

impl<R: AsyncRead + Unpin> Player<R> {
    /// Create a player over `source`.
    pub fn new(source: R) -> Self {
        Self {
            reader: FrameReader::new(source),
            options: PlaybackOptions::default(),
            last_offset: 0.0,
        }
    }

    /// Set playback options.
    #[must_use]
    pub const fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    /// Replay every frame to `writer`, sleeping between frames to match
    /// the recorded gaps.
    ///
    /// Each payload is flushed as soon as it is written. A recording with no
    /// frames produces no output.
    pub async fn play_to<W>(&mut self, writer: &mut W) -> Result<PlaybackReport>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        tracing::debug!(speed = ?self.options.speed, "playback started");
        let mut report = PlaybackReport::default();

        while let Some(frame) = self.reader.next_frame().await? {
            let delay = self.delay_for(&frame, report.frames)?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            writer
                .write_all(&frame.payload)
                .await
                .map_err(ShattyError::Write)?;
            writer.flush().await.map_err(ShattyError::Write)?;

            report.frames += 1;
            report.bytes += frame.payload.len() as u64;
        }

        tracing::debug!(frames = report.frames, bytes = report.bytes, "playback finished");
        Ok(report)
    }

    /// Unwrap the source.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn delay_for(&mut self, frame: &Frame, index: u64) -> Result<Duration> {
        if !frame.offset.is_finite() {
            return Err(ShattyError::InvalidOffset {
                index,
                offset: frame.offset,
            });
        }

        let gap = frame.offset - self.last_offset;
        if gap < 0.0 {
            tracing::warn!(
                index,
                offset = frame.offset,
                previous = self.last_offset,
                "frame offset went backwards; playing without delay"
            );
            return Ok(Duration::ZERO);
        }

        self.last_offset = frame.offset;
        Ok(self.options.speed.scale(gap))
    }
}
