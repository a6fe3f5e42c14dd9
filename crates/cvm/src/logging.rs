//! Log setup for a single `cvm` run. With `debug_logging` on, records are
//! appended to the log file; `--verbose` mirrors them to stderr.

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

pub fn init_logging(log_path: &Path, debug_enabled: bool, verbose: bool, max_log_size: u64) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("cvm")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if debug_enabled {
        match open_log_file(log_path, max_log_size) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
            Err(e) => eprintln!("cvm: cannot open log {}: {e}", log_path.display()),
        }
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
    log::debug!("Logging to {}", log_path.display());
}

/// Open the log for appending, first cutting it down to its newer half when
/// it has grown past `max_size`.
fn open_log_file(path: &Path, max_size: u64) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::metadata(path).is_ok_and(|metadata| metadata.len() > max_size) {
        let contents = std::fs::read(path)?;
        std::fs::write(path, newer_half(&contents))?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Second half of `contents`, starting after the first newline past the
/// midpoint so no line is cut.
fn newer_half(contents: &[u8]) -> &[u8] {
    let half = contents.len() / 2;
    match contents[half..].iter().position(|&b| b == b'\n') {
        Some(pos) => &contents[half + pos + 1..],
        None => &contents[half..],
    }
}
