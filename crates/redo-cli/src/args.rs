//! Command-line surface: options before the command, stages split on `|`.

use clap::{ArgAction, CommandFactory, Parser};
use redo_core::spec::{DEFAULT_MAX_ARGS, DEFAULT_MAX_STAGES};
use redo_core::{parse_repeat, parse_timeout, Limits, PipelineSpec, RedoError, RoundOptions};

const EXAMPLES: &str = "\
Examples:
  redo -r 5 -e 10s ping -c 1 example.com
      Run 'ping -c 1 example.com' five times, each limited to 10 seconds.
  redo -u -e 1m curl -sf http://localhost:8080/health '|' grep ok
      Repeat the pipeline until it succeeds. Quote '|' so the shell passes it through.";

#[derive(Parser, Debug)]
#[command(name = "redo")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repeatedly execute a command pipeline", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Show this help message and exit (only recognised before COMMAND)
    #[arg(short = 'h', short_alias = '?', action = ArgAction::SetTrue)]
    help: bool,

    /// Show version information and exit
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    version: bool,

    /// Timeout for each stage of a round, in seconds; append s, m or h for units
    #[arg(short = 'e', long = "timeout", value_name = "N[s|m|h]")]
    timeout: Option<String>,

    /// Repeat the pipeline N times
    #[arg(short = 'r', long = "repeat", value_name = "N")]
    repeat: Option<String>,

    /// Repeat the pipeline until it succeeds (overrides --repeat)
    #[arg(short = 'u', long = "until-success")]
    until_success: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Maximum number of pipeline stages
    #[arg(long, env = "REDO_MAX_STAGES", default_value_t = DEFAULT_MAX_STAGES)]
    max_stages: usize,

    /// Maximum number of words per stage, program included
    #[arg(long = "max-args", env = "REDO_MAX_ARGS", default_value_t = DEFAULT_MAX_ARGS)]
    max_args: usize,

    /// Command to run; separate pipeline stages with a '|' token
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

/// Errors from turning argv into a run.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    /// Rejected by the option parser; carries clap's own rendering and exit code.
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error(transparent)]
    Config(#[from] RedoError),
}

/// Everything the binary needs to perform a run.
#[derive(Debug)]
pub struct Invocation {
    pub spec: PipelineSpec,
    pub verbose: bool,
    pub json: bool,
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum ParsedArgs {
    ShowHelp,
    ShowVersion,
    Run(Invocation),
}

/// Parse an argv (program name first) into a run or a help request.
pub fn parse_args<I, T>(argv: I) -> Result<ParsedArgs, ArgsError>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
    if requests_help(argv.get(1..).unwrap_or_default()) {
        return Ok(ParsedArgs::ShowHelp);
    }

    let cli = Cli::try_parse_from(&argv)?;
    if cli.help {
        return Ok(ParsedArgs::ShowHelp);
    }
    if cli.version {
        return Ok(ParsedArgs::ShowVersion);
    }

    let timeout = cli
        .timeout
        .as_deref()
        .map(parse_timeout)
        .transpose()?
        .filter(|t| !t.is_zero());
    let repeat_count = cli.repeat.as_deref().map(parse_repeat).transpose()?.unwrap_or(1);

    let options = RoundOptions {
        timeout,
        repeat_count,
        until_success: cli.until_success,
    };
    let limits = Limits {
        max_stages: cli.max_stages,
        max_args_per_stage: cli.max_args,
    };
    let spec = PipelineSpec::from_tokens(&cli.command, options, limits)?;

    Ok(ParsedArgs::Run(Invocation {
        spec,
        verbose: cli.verbose,
        json: cli.json,
    }))
}

/// Rendered usage text.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Whether `-h` or `-?` appears among the options before the command.
///
/// Help wins over anything seen earlier, including option values that would
/// otherwise fail to parse.
fn requests_help(tokens: &[String]) -> bool {
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "-h" | "-?" => return true,
            "-e" | "--timeout" | "-r" | "--repeat" | "--max-stages" | "--max-args" => {
                iter.next();
            }
            "--" => return false,
            t if t.starts_with('-') => {}
            _ => return false,
        }
    }
    false
}
