//! Error types for shatty.
//!
//! [`ShattyError`] names the operation that failed (spawn, read, write,
//! decode, ...) so the binary can report it verbatim. Normal termination
//! signals (the session's peer closing, a source ending between frames)
//! never become errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while decoding a frame from a source.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source ended inside the 12-byte frame header.
    #[error("truncated frame header: got {read} of 12 bytes")]
    TruncatedHeader {
        /// Header bytes that were available.
        read: usize,
    },

    /// The source ended inside the frame payload.
    #[error("truncated frame payload: got {read} of {expected} bytes")]
    TruncatedPayload {
        /// Payload length announced by the header.
        expected: u32,
        /// Payload bytes that were available.
        read: usize,
    },

    /// The source itself failed.
    #[error("failed to read frame: {0}")]
    Io(#[from] io::Error),
}

/// Failures of the network collaborator behind a streamed endpoint.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The endpoint descriptor is not a usable URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The descriptor as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP request could not be performed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server responded with {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// I/O failure while moving bytes.
    #[error("transfer I/O error: {0}")]
    Io(#[from] io::Error),

    /// The pump task went away before the transfer completed.
    #[error("transfer closed before completion")]
    Closed,

    /// The pump task panicked or was cancelled.
    #[error("transfer task failed: {0}")]
    TaskFailed(String),
}

/// The main error type for shatty operations.
#[derive(Debug, Error)]
pub enum ShattyError {
    /// The capture command could not be spawned.
    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        /// The program that was being started.
        command: String,
        /// The underlying PTY error.
        #[source]
        source: shatty_pty::PtyError,
    },

    /// Reading session output or a recording failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing a frame or echoing output failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The recording is malformed.
    ///
    /// I/O failures underneath the decoder become [`ShattyError::Read`].
    #[error("decode failed: {0}")]
    Decode(#[source] DecodeError),

    /// The destination could not be opened.
    #[error("failed to open output {target}: {source}")]
    OpenSink {
        /// The destination descriptor.
        target: String,
        /// Why it failed.
        #[source]
        source: io::Error,
    },

    /// The recording could not be opened.
    #[error("failed to open recording {target}: {source}")]
    OpenSource {
        /// The source descriptor.
        target: String,
        /// Why it failed.
        #[source]
        source: io::Error,
    },

    /// A streamed transfer failed.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Waiting on the captured child failed.
    #[error("failed to wait for command: {0}")]
    Wait(#[source] shatty_pty::PtyError),

    /// Switching terminal modes failed.
    #[error("terminal mode change failed: {0}")]
    Terminal(#[source] io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error in {location}: {message}", location = display_path(path.as_ref()))]
    Config {
        /// File the problem came from, if any.
        path: Option<PathBuf>,
        /// Description of the problem.
        message: String,
    },

    /// `record` was given nothing to run.
    #[error("no command given to record")]
    EmptyCommand,

    /// A frame carries an offset that cannot be scheduled.
    #[error("frame {index} has invalid offset {offset}")]
    InvalidOffset {
        /// Zero-based frame index.
        index: u64,
        /// The offending offset.
        offset: f64,
    },

    /// A payload does not fit the 32-bit length field.
    #[error("frame payload of {len} bytes exceeds the 4 GiB limit")]
    FrameTooLarge {
        /// Payload length.
        len: usize,
    },
}

impl From<DecodeError> for ShattyError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io(e) => Self::Read(e),
            malformed => Self::Decode(malformed),
        }
    }
}

fn display_path(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| "<settings>".to_string(), |p| p.display().to_string())
}

impl ShattyError {
    /// Create a configuration error.
    pub fn config(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path,
            message: message.into(),
        }
    }

    /// Process exit status for this error. Always non-zero.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::EmptyCommand => 2,
            Self::Decode(_) | Self::InvalidOffset { .. } => 3,
            Self::Spawn { .. } => 127,
            _ => 1,
        }
    }
}

/// Result type for shatty operations.
pub type Result<T> = std::result::Result<T, ShattyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_name_the_truncation() {
        let header = DecodeError::TruncatedHeader { read: 5 };
        assert_eq!(header.to_string(), "truncated frame header: got 5 of 12 bytes");

        let payload = DecodeError::TruncatedPayload {
            expected: 10,
            read: 3,
        };
        assert_eq!(
            payload.to_string(),
            "truncated frame payload: got 3 of 10 bytes"
        );
    }

    #[test]
    fn shatty_error_wraps_decode() {
        let err: ShattyError = DecodeError::TruncatedHeader { read: 1 }.into();
        assert!(err.to_string().starts_with("decode failed:"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn source_failures_are_read_errors() {
        let err: ShattyError = DecodeError::Io(io::Error::other("connection reset")).into();
        assert!(matches!(err, ShattyError::Read(_)));
        assert_eq!(err.to_string(), "read failed: connection reset");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn config_error_without_path() {
        let err = ShattyError::config(None, "chunk_size must be positive");
        assert_eq!(
            err.to_string(),
            "configuration error in <settings>: chunk_size must be positive"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn exit_codes_are_nonzero() {
        let errors = [
            ShattyError::EmptyCommand,
            ShattyError::Read(io::Error::other("x")),
            ShattyError::Write(io::Error::other("x")),
            ShattyError::Transfer(TransferError::Closed),
            ShattyError::FrameTooLarge { len: 0 },
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
