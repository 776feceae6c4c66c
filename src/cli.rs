//! CLI argument definitions using clap.

use std::ffi::OsString;

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, error::ErrorKind};
use fanout_bus::{Error, output::DEFAULT_OUTPUT_FORMAT};

/// Copy one media input, packet for packet, to any number of listening outputs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "remux-fanout",
    version,
    about = "Copy one media input to many listening outputs without transcoding",
    long_about = "Reads packets from one input and forwards every one of them, \n\
                  without decoding, to each output in the order the outputs were \n\
                  given. Outputs listen for a single peer and reopen when it leaves."
)]
pub struct Cli {
    /// Input URI: file, capture device or network address
    #[arg(short = 'i', value_name = "URI", required = true, action = ArgAction::Append)]
    pub inputs: Vec<String>,

    /// Listening output URI, repeat for more outputs
    #[arg(short = 'o', value_name = "URI", action = ArgAction::Append)]
    pub outputs: Vec<String>,

    /// Container format written to every output
    #[arg(
        short = 'f',
        long = "format",
        value_name = "NAME",
        default_value = DEFAULT_OUTPUT_FORMAT,
        env = "REMUX_FANOUT_FORMAT"
    )]
    pub format: String,

    /// Force the input demuxer (e.g. v4l2, mjpeg, mpegts)
    #[arg(long, value_name = "NAME")]
    pub input_format: Option<String>,

    /// Give up waiting for an output's peer after this many milliseconds and
    /// retry on the next packet (default: wait forever)
    #[arg(long, value_name = "MS", env = "REMUX_FANOUT_ACCEPT_TIMEOUT")]
    pub accept_timeout: Option<u64>,

    /// Reopen attempts right after an output's peer disconnects
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub reconnect_attempts: u32,

    /// Pause between two failed reopen attempts
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub reconnect_backoff: u64,

    /// Muxer option applied when an output writes its header
    #[arg(long = "header-option", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub header_options: Vec<(String, String)>,

    /// Disable an output whose setup fails instead of stopping everything
    #[arg(long)]
    pub isolate_failures: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, env = "REMUX_FANOUT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Parse and validate `args`, the first item being the program name.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        check_order(&matches).map_err(|e| Self::command().error(ErrorKind::ArgumentConflict, e))?;
        Self::from_arg_matches(&matches)
    }

    pub fn input(&self) -> &str {
        self.inputs.first().map(String::as_str).unwrap_or_default()
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// One input, given before any output.
fn check_order(matches: &ArgMatches) -> Result<(), Error> {
    let inputs: Vec<usize> = matches
        .indices_of("inputs")
        .map(|indices| indices.collect())
        .unwrap_or_default();
    if inputs.len() > 1 {
        return Err(Error::Usage(format!(
            "only one input (-i) is supported, got {}",
            inputs.len()
        )));
    }

    let (Some(&input), Some(mut outputs)) = (inputs.first(), matches.indices_of("outputs")) else {
        return Ok(());
    };
    if outputs.any(|output| output < input) {
        return Err(Error::Usage(
            "outputs (-o) must come after the input (-i)".to_string(),
        ));
    }
    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;
