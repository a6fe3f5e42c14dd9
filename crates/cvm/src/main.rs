//! `cvm`: install, activate and compare versions of a command-line tool.

mod app;
mod cli;
mod commands;
mod error;
mod logging;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use console::style;
use cvm_platform::CvmPaths;
use log::{error, warn};

use crate::app::App;
use crate::cli::Cli;
use crate::error::CliError;
use crate::settings::Settings;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match CvmPaths::new() {
        Ok(paths) => paths,
        Err(e) => return report(&CliError::from(e)),
    };
    if let Err(e) = paths.ensure_dirs() {
        return report(&CliError::from(e));
    }

    let (settings, settings_error) = match Settings::load(&paths.settings_file()) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    logging::init_logging(
        &paths.log_file(),
        settings.debug_logging,
        cli.verbose,
        settings.max_log_size_bytes,
    );
    if let Some(e) = settings_error {
        warn!("{e}; using default settings");
        eprintln!(
            "{} {e}; using default settings",
            style("warning:").yellow().bold()
        );
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return report(&CliError::from(e)),
    };

    let result = runtime.block_on(async {
        let app = App::new(paths, settings)?;
        let cwd = std::env::current_dir()?;
        commands::run(&app, cli.command, &cwd).await
    });

    match result {
        Ok(code) => exit_code(code),
        Err(e) => report(&e),
    }
}

fn report(e: &CliError) -> ExitCode {
    error!("{e}");
    eprintln!("{} {e}", style("error:").red().bold());
    ExitCode::from(e.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => std::process::exit(code),
    }
}
