//! shelfsort-convert CLI entry point

use clap::Parser;
use shelfsort::config::cli::log_filter;
use shelfsort::config::{ConvertCli, ConvertSettings};
use shelfsort::pipeline::{convert, CancelFlag};
use std::path::Path;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Help and version go to stdout with status 0; every usage error is status 1
    let cli = match ConvertCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = validate_directory(&cli.directory) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = ConvertSettings::from_cli(&cli);

    let cancel = CancelFlag::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        warn!("{}", e);
    }

    match convert::run(&settings, cancel) {
        Ok(report) => {
            if settings.dry_run {
                return ExitCode::SUCCESS;
            }

            report.summary.print_report();
            if let Some(dir) = &report.backup_dir {
                println!();
                println!("Previous conversions backed up to {}", dir.display());
            }
            if let Some(dir) = &report.log_dir {
                println!("Encoder logs for failed files: {}", dir.display());
            }

            if report.summary.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, quiet))),
        )
        .with_target(false)
        .init();
}

fn validate_directory(dir: &Path) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!(
            "Not a directory: {}\n\n  Tip: Pass the folder holding your audio files.\n  Example:\n    shelfsort-convert -b 256 -d 2 ~/Music/Incoming",
            dir.display()
        ));
    }
    Ok(())
}
