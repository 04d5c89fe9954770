//! shelfsort-organize CLI entry point

use clap::Parser;
use shelfsort::config::cli::log_filter;
use shelfsort::config::{OrganizeCli, OrganizeSettings};
use shelfsort::pipeline::{organize, CancelFlag};
use std::path::Path;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = match OrganizeCli::try_parse() {
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

    let settings = OrganizeSettings::from_cli(&cli);

    let cancel = CancelFlag::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        warn!("{}", e);
    }

    if settings.dry_run {
        println!();
        println!("=== DRY RUN MODE ===");
        println!();
    }

    match organize::run(&settings, cancel) {
        Ok(report) => {
            // Nothing to organize is not an error
            if report.summary.found == 0 {
                println!(
                    "No supported audio files to organize in {}",
                    settings.root.display()
                );
                return ExitCode::SUCCESS;
            }

            report.summary.print_report();
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
            "Not a directory: {}\n\n  Tip: Pass the folder holding the files to sort.\n  Examples:\n    shelfsort-organize ~/Music/Unsorted\n    shelfsort-organize -f mp3,flac -r ~/Music",
            dir.display()
        ));
    }
    Ok(())
}
