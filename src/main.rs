//! media-convert - batch AU/WAV/SGI converter

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info};
use mediacodec::{convert, init_logging, Args, Config, Error, Status};
use std::path::Path;
use std::process;

fn main() {
    let args = Args::parse();

    init_logging(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether every input converted.
fn run(args: Args) -> anyhow::Result<bool> {
    let print_config = args.print_config;
    let config = Config::from_args_and_config(args).context("invalid configuration")?;

    if print_config {
        print!("{}", config.to_toml()?);
        return Ok(true);
    }

    debug!("{}", mediacodec::get_library_info());
    info!(
        "Converting {} file(s) into '{}' with {} worker(s)",
        config.inputs.len(),
        config.output_dir().display(),
        config.workers()
    );

    let results = convert::convert_all(&config)?;

    let stderr = std::io::stderr();
    let mut sink = stderr.lock();
    let mut failed = 0usize;
    for (input, result) in &results {
        match result {
            Ok(report) => {
                for output in &report.outputs {
                    println!("{} -> {}", input.display(), output.display());
                }
            }
            Err(e) => {
                failed += 1;
                if failure_status(input, e).print(&mut sink) < 0 {
                    error!("{}: could not report '{}'", input.display(), e);
                }
            }
        }
    }

    info!("{} converted, {} failed", results.len() - failed, failed);
    Ok(failed == 0)
}

/// The error's status line, naming the input it came from.
fn failure_status(input: &Path, e: &Error) -> Status {
    let message = if e.message().is_empty() {
        format!("'{}'", input.display())
    } else {
        format!("{} ('{}')", e.message(), input.display())
    };
    Status::from(Error::new(e.kind(), e.origin(), message))
}
