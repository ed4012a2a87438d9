//! qc - Command-line driver for the QC interpreter.
//!
//! Loads one QC source file, prescans it, and runs its `main` function.
//! The process exit status is the script's result; diagnostics go to
//! stderr and exit with status 1.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qc_interp::Interp;
use qc_util::{ErrorKind, QcError};

/// QC - an interpreter for a small C-like language
#[derive(Parser, Debug)]
#[command(name = "qc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a QC source file", long_about = None)]
struct Cli {
    /// Source file to run
    file: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, env = "QC_VERBOSE")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli.file) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Loads and runs `file`, returning the script's exit code.
fn run(file: &Path) -> anyhow::Result<i32> {
    let mut interp = Interp::new();
    if let Err(e) = interp.load_file(file) {
        bail!("{}", interp.diagnostic(&e));
    }
    match interp.execute("main") {
        Ok(Some(result)) => Ok(result.val.as_int().unwrap_or(0) as i32),
        Ok(None) => {
            let e = QcError::new(ErrorKind::NoMain);
            bail!("{}", interp.diagnostic(&e));
        }
        Err(e) => bail!("{}", interp.diagnostic(&e)),
    }
}
