//! The `shatty` command.
//!
//! ```text
//! shatty record [-o PATH_OR_URL] [--headless] -- COMMAND [ARGS...]
//! shatty play [PATH_OR_URL] [--speed F]
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shatty::config::DEFAULT_OUTPUT;
use shatty::{
    Capture, CrosstermTerminal, Endpoint, ExitStatus, PlaybackOptions, Player, Result,
    ShattyConfig, Sink, Source, TerminalControl,
};

#[derive(Debug, Parser)]
#[command(name = "shatty")]
#[command(about = "Record a terminal session with timing, and play it back")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $SHATTY_CONFIG when set)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a command in a pseudo-terminal and record its output
    Record(RecordArgs),
    /// Replay a recording to stdout
    Play(PlayArgs),
}

#[derive(Debug, Args)]
struct RecordArgs {
    /// Where to write the recording: a file path or an http(s) URL
    #[arg(short, long, value_name = "PATH_OR_URL")]
    output: Option<String>,

    /// Do not echo the session to this terminal while recording
    #[arg(long)]
    headless: bool,

    /// The command to record, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Recording to replay: a file path or an http(s) URL
    #[arg(value_name = "PATH_OR_URL", default_value = DEFAULT_OUTPUT)]
    source: String,

    /// Speed multiplier; 0 plays without delays
    #[arg(long, value_name = "F")]
    speed: Option<f64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "fatal error");
            eprintln!("shatty: {e}");
            e.exit_code()
        }
    };
    // Exit here rather than returning: a blocked stdin read would otherwise
    // keep the runtime from shutting down.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = ShattyConfig::load(cli.config.as_deref())?;
    shatty::logging::init_logging(&config.log)?;

    match cli.command {
        Command::Record(args) => {
            if let Some(output) = args.output {
                config.record.output = output;
            }
            config.record.headless |= args.headless;
            config.validate()?;
            record(args.command, &config).await
        }
        Command::Play(args) => {
            if let Some(speed) = args.speed {
                config.play.speed = speed;
            }
            config.validate()?;
            play(&args.source, &config).await
        }
    }
}

async fn record(command: Vec<OsString>, config: &ShattyConfig) -> Result<i32> {
    let endpoint = Endpoint::parse(&config.record.output)?;
    let sink = Sink::open(&endpoint, config.endpoint_options()).await?;

    let terminal: Box<dyn TerminalControl> = if config.record.raw_mode {
        Box::new(CrosstermTerminal::new())
    } else {
        Box::new(CrosstermTerminal::detached())
    };

    let report = Capture::new(command)
        .headless(config.record.headless)
        .chunk_size(config.record.chunk_size)
        .terminal(terminal)
        .run(sink)
        .await?;

    match report.exit_status {
        ExitStatus::Exited(code) => println!("Command exited with code: {code}"),
        ExitStatus::Signaled(signal) => println!("Command terminated by signal: {signal}"),
    }
    tracing::info!(
        frames = report.frames,
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "recording saved to {}",
        endpoint
    );
    Ok(0)
}

async fn play(source: &str, config: &ShattyConfig) -> Result<i32> {
    let endpoint = Endpoint::parse(source)?;
    let source = Source::open(&endpoint, config.endpoint_options()).await?;

    let options = PlaybackOptions::new().with_speed(config.playback_speed());
    let mut player = Player::new(source).with_options(options);
    let mut stdout = tokio::io::stdout();
    let report = player.play_to(&mut stdout).await?;

    player.into_inner().finish().await?;
    tracing::debug!(frames = report.frames, bytes = report.bytes, "playback complete");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_takes_trailing_command() {
        let cli = Cli::try_parse_from([
            "shatty", "record", "-o", "out.shatty", "--headless", "--", "ls", "-la",
        ])
        .unwrap();
        let Command::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.output.as_deref(), Some("out.shatty"));
        assert!(args.headless);
        assert_eq!(args.command, vec![OsString::from("ls"), OsString::from("-la")]);
    }

    #[test]
    fn record_requires_a_command() {
        assert!(Cli::try_parse_from(["shatty", "record"]).is_err());
    }

    #[test]
    fn play_defaults_to_output_file() {
        let cli = Cli::try_parse_from(["shatty", "play"]).unwrap();
        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.source, "output.shatty");
        assert_eq!(args.speed, None);
    }

    #[test]
    fn play_accepts_speed_and_url() {
        let cli =
            Cli::try_parse_from(["shatty", "play", "https://example.com/r", "--speed", "2"])
                .unwrap();
        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.source, "https://example.com/r");
        assert_eq!(args.speed, Some(2.0));
    }
}
