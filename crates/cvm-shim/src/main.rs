//! Stands in for the managed tool on PATH and forwards every invocation to
//! the active version, exiting with the child's exact code.

mod dispatch;

use std::fs::OpenOptions;
use std::process::ExitCode;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::dispatch::{binary_name, dispatch, locate_paths, record_in_background};

const LOG_ENV: &str = "CVM_SHIM_LOG";

fn main() -> ExitCode {
    let Some(exe) = std::env::current_exe().ok() else {
        eprintln!("cvm: cannot determine shim location");
        return ExitCode::FAILURE;
    };
    let (Some(paths), Some(binary)) = (locate_paths(&exe), binary_name(&exe)) else {
        eprintln!("cvm: cannot determine cvm home");
        return ExitCode::FAILURE;
    };

    // Stdout belongs to the tool; diagnostics only ever go to the log file.
    if std::env::var_os(LOG_ENV).is_some()
        && let Ok(file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths.log_file())
    {
        let config = ConfigBuilder::new()
            .set_time_format_rfc3339()
            .add_filter_allow_str("cvm")
            .build();
        let _ = WriteLogger::init(LevelFilter::Debug, config, file);
    }

    let args: Vec<_> = std::env::args_os().skip(1).collect();
    match dispatch(&paths, &binary, &args) {
        Ok(dispatched) => {
            record_in_background(&paths, &dispatched, &args);
            exit_code(dispatched.exit_code)
        }
        Err(e) => {
            eprintln!("cvm: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Codes outside `0..=255` only occur on Windows and go through
/// `process::exit` unchanged.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => std::process::exit(code),
    }
}
