//! Genre CLI - Genre Classification Pipeline
//!
//! Command-line entry point: parses flags, sets up logging and runs the
//! requested stages.

use std::error::Error as _;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use genre::cli::{logger, Cli};
use genre::pipeline::Orchestrator;
use genre::tools::ProcessRunner;
use genre::{GenreError, Result};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    logger(cli.verbose, cli.log_file.as_deref())?.init();
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.to_config();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Genre Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let runner = ProcessRunner;
    let mut orchestrator = Orchestrator::new(config, &runner);
    orchestrator.run(cli.actions())?;

    info!("Pipeline finished: {}", orchestrator.state());
    Ok(())
}

fn report_error(e: &GenreError) {
    error!("[{}] {}", e.error_code(), e);
    eprintln!("Error [{}]: {}", e.error_code(), e);

    let mut cause = e.root().source();
    while let Some(inner) = cause {
        eprintln!("  caused by: {}", inner);
        cause = inner.source();
    }

    let suggestions = e.recovery_suggestions();
    if !suggestions.is_empty() {
        eprintln!("Suggestions:");
        for suggestion in suggestions {
            eprintln!("  - {}", suggestion);
        }
    }
}
