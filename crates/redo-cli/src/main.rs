//! redo - repeatedly execute a command pipeline
//!
//! ```text
//! redo [OPTIONS] COMMAND [ARGS...] ['|' COMMAND [ARGS...]]...
//! ```
//!
//! Runs the pipeline once, a fixed number of times (`-r`), or until it
//! succeeds (`-u`), with an optional per-stage timeout (`-e`). Invoked with
//! no arguments, reads the command line from stdin instead.

mod args;
mod prompt;

use anyhow::{Context, Result};
use args::{ArgsError, ParsedArgs};
use redo_core::{ProcessRoundExecutor, RepeatController};
use tracing::{info, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let mut argv: Vec<String> = std::env::args().collect();

    if argv.len() <= 1 {
        match prompt::read_command_from_stdin().context("Failed to read command from stdin")? {
            Some(tokens) => argv.extend(tokens),
            None => return Ok(()),
        }
    }

    let invocation = match args::parse_args(argv) {
        Ok(ParsedArgs::Run(invocation)) => invocation,
        Ok(ParsedArgs::ShowHelp) => {
            eprintln!("{}", args::usage());
            return Ok(());
        }
        Ok(ParsedArgs::ShowVersion) => {
            println!("redo {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Err(ArgsError::Usage(e)) => e.exit(),
        Err(ArgsError::Config(e)) => return Err(e.into()),
    };

    let level = if invocation.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    redo_core::init_tracing(invocation.json, level);

    let controller = RepeatController::new(ProcessRoundExecutor);
    let summary = controller.run(&invocation.spec).await;

    info!(
        summary = %serde_json::to_string(&summary)?,
        "Run summary"
    );

    // Reaching the end of the run is success, whatever the last round did.
    Ok(())
}
