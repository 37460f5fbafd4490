//! xmltv-tool - inspect and manipulate XMLTV program guides
//!
//! Merges any number of guide files, optionally filters them by channel or
//! date, shifts or normalizes programme times, then prints either summary
//! reports or the resulting XMLTV document.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmltv_tool::config::{Cli, FileConfig, Options};
use xmltv_tool::error::{Result, XmltvError};
use xmltv_tool::pipeline::{self, Outcome};

/// Log to stderr so stdout only ever carries the report or document.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn write_outcome(outcome: Outcome) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match outcome {
        Outcome::Skipped => return Ok(()),
        Outcome::Report(lines) => {
            for line in lines {
                writeln!(out, "{}", line).map_err(|e| XmltvError::Write(e.to_string()))?;
            }
        }
        Outcome::Document(doc) => doc.write_to(&mut out)?,
    }
    out.flush().map_err(|e| XmltvError::Write(e.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let file_config = FileConfig::load(cli.config.as_deref());
    let options = Options::resolve(cli, file_config);

    match pipeline::run(&options).and_then(write_outcome) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
