// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chromascan: report which pages of PDF files carry colored marks.
//
// Entry point. Initialises logging, loads the scan configuration, runs the
// batch and prints the JSON report on stdout.

mod scan;

use std::path::PathBuf;
use std::process::ExitCode;

use chromascan_core::ScanConfig;
use chromascan_core::error::Result;

use scan::BatchRunner;

/// Environment variable naming a JSON configuration file.
const CONFIG_ENV: &str = "CHROMASCAN_CONFIG";

const USAGE: &str = "Usage: chromascan <file1.pdf> <file2.pdf> ...

Prints a JSON report of the colored pages of each file.
Logging is controlled by RUST_LOG (default: info).
Settings are read from the JSON file named by CHROMASCAN_CONFIG, if set.";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    match run(&paths) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "chromascan failed");
            ExitCode::FAILURE
        }
    }
}

fn run(paths: &[PathBuf]) -> Result<ExitCode> {
    let config = load_config()?;
    tracing::info!(files = paths.len(), "Chromascan starting");

    let runner = BatchRunner::new(config.clone());
    let report = runner.run(paths)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = report.fail_count() + report.bad_count();
    tracing::info!(
        pass = report.pass_count(),
        fail = report.fail_count(),
        bad = report.bad_count(),
        skipped = report.skipped.len(),
        "Batch complete"
    );
    if failed > 0 && !config.keep_going {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config() -> Result<ScanConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            tracing::debug!(path = %PathBuf::from(&path).display(), "Loading config");
            ScanConfig::load(PathBuf::from(path))
        }
        None => Ok(ScanConfig::default()),
    }
}
