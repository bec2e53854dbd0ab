//! Configuration for the `shatty` binary.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `SHATTY_CONFIG`)
//! 3. `SHATTY_*` environment variables
//! 4. command-line flags (applied by the binary)
//!
//! ```toml
//! [record]
//! output = "session.shatty"
//! headless = false
//! chunk_size = 16384
//!
//! [play]
//! speed = 2.0
//!
//! [log]
//! level = "debug"
//! file = "/tmp/shatty.log"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::capture::DEFAULT_CHUNK_SIZE;
use crate::endpoint::{DEFAULT_CHANNEL_CAPACITY, EndpointOptions};
use crate::error::{Result, ShattyError};
use crate::playback::PlaybackSpeed;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHATTY";

/// Default recording destination and playback source.
pub const DEFAULT_OUTPUT: &str = "output.shatty";

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShattyConfig {
    /// Recording settings.
    pub record: RecordConfig,
    /// Playback settings.
    pub play: PlayConfig,
    /// Remote endpoint settings.
    pub transfer: TransferConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// `[record]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordConfig {
    /// Destination path or URL.
    pub output: String,
    /// Suppress live echo.
    pub headless: bool,
    /// Maximum bytes per frame.
    pub chunk_size: usize,
    /// Put the terminal into raw mode while recording.
    pub raw_mode: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            output: DEFAULT_OUTPUT.to_string(),
            headless: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            raw_mode: true,
        }
    }
}

/// `[play]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayConfig {
    /// Speed multiplier; `0` plays without delays.
    pub speed: f64,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// `[transfer]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Chunks buffered between an engine and its network task.
    pub channel_capacity: usize,
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            connect_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive used when neither `SHATTY_LOG` nor `RUST_LOG` is set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Append logs here instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

impl ShattyConfig {
    /// Parse a TOML document. `path` is only used in error messages.
    pub fn from_toml_str(contents: &str, path: Option<&Path>) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ShattyError::config(path.map(Path::to_path_buf), e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ShattyError::config(Some(path.to_path_buf()), e.to_string()))?;
        Self::from_toml_str(&contents, Some(path))
    }

    /// Load defaults, the config file and environment overrides, then
    /// validate the result.
    ///
    /// `explicit` takes precedence over `SHATTY_CONFIG`. Without either no
    /// file is read.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvOverrides::from_process();
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.get("CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(ref path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHATTY_*` overrides.
    pub fn apply_env(&mut self, env: &EnvOverrides) -> Result<()> {
        if let Some(headless) = env.bool("HEADLESS")? {
            self.record.headless = headless;
        }
        if let Some(chunk_size) = env.parse("CHUNK_SIZE")? {
            self.record.chunk_size = chunk_size;
        }
        if let Some(speed) = env.parse("SPEED")? {
            self.play.speed = speed;
        }
        if let Some(level) = env.get("LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    /// Check ranges that the type system cannot.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ShattyError::config(None, message));

        if self.record.chunk_size == 0 || u32::try_from(self.record.chunk_size).is_err() {
            return invalid(format!(
                "chunk_size must be between 1 and {}, got {}",
                u32::MAX,
                self.record.chunk_size
            ));
        }
        if self.transfer.channel_capacity == 0 {
            return invalid("channel_capacity must be at least 1".to_string());
        }
        if !self.play.speed.is_finite() || self.play.speed < 0.0 {
            return invalid(format!(
                "speed must be a non-negative number, got {}",
                self.play.speed
            ));
        }
        Ok(())
    }

    /// Options for opening sinks and sources.
    #[must_use]
    pub const fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            channel_capacity: self.transfer.channel_capacity,
            connect_timeout: Duration::from_secs(self.transfer.connect_timeout_secs),
        }
    }

    /// Playback speed from the `[play]` multiplier.
    #[must_use]
    pub fn playback_speed(&self) -> PlaybackSpeed {
        PlaybackSpeed::from_multiplier(self.play.speed)
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads prefixed environment variables.
pub struct EnvOverrides {
    prefix: String,
    lookup: Lookup,
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl EnvOverrides {
    /// Read from the process environment with the `SHATTY` prefix.
    #[must_use]
    pub fn from_process() -> Self {
        Self::with_lookup(ENV_PREFIX, |name| std::env::var(name).ok())
    }

    /// Read through `lookup`, which receives full variable names.
    pub fn with_lookup<F>(prefix: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            lookup: Box::new(lookup),
        }
    }

    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Raw value of `PREFIX_NAME`. Empty values count as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.var_name(name)).filter(|v| !v.trim().is_empty())
    }

    /// Parsed value of `PREFIX_NAME`.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|e| {
                    ShattyError::config(None, format!("{}={raw:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Boolean value of `PREFIX_NAME`.
    pub fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ShattyError::config(
                None,
                format!("{}={raw:?}: expected a boolean", self.var_name(name)),
            )),
        }
    }
}
