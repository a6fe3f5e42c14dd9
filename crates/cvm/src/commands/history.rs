use std::time::Duration;

use chrono::Utc;
use console::style;
use cvm_backend::{CvmError, VersionId};
use cvm_core::{HistoryEntry, NewEntry};
use cvm_exec::replay;
use log::debug;

use crate::app::App;
use crate::cli::{HistoryArgs, HistoryCommand, RecordArgs};
use crate::error::CliError;

pub async fn run(app: &App, args: HistoryArgs) -> Result<i32, CliError> {
    match args.action {
        Some(HistoryCommand::Replay { id }) => return replay_entry(app, &id).await,
        Some(HistoryCommand::Record(record_args)) => return record(app, record_args),
        None => {}
    }

    if let Some(entry) = args.entry {
        if !entry.starts_with('!') {
            return Err(CvmError::InvalidHistoryId { input: entry }.into());
        }
        return replay_entry(app, &entry).await;
    }

    if args.clear {
        let removed = app.history.clear()?;
        println!("Cleared {removed} history entries");
        return Ok(0);
    }

    if args.stats {
        print_stats(app)?;
        return Ok(0);
    }

    let entries = app.history.recent(args.limit)?;
    if entries.is_empty() {
        println!("No history recorded yet");
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(0)
}

fn format_entry(entry: &HistoryEntry) -> String {
    let exit = if entry.succeeded() {
        style(format!("exit {}", entry.exit_code)).green()
    } else {
        style(format!("exit {}", entry.exit_code)).red()
    };
    format!(
        "{:>4}  {}  {:<10} {exit:<8} {:>7}ms  {}",
        entry.id,
        entry.timestamp.format("%Y-%m-%d %H:%M:%SZ"),
        entry.version.to_string(),
        entry.duration,
        entry.command
    )
}

fn print_stats(app: &App) -> Result<(), CliError> {
    let stats = app.history.stats()?;
    println!("Total invocations: {}", stats.total);
    println!(
        "Successful:        {} ({:.1}%)",
        stats.successes, stats.success_rate
    );
    println!(
        "Average duration:  {}ms",
        stats.average_duration.as_millis()
    );
    if !stats.per_version.is_empty() {
        println!("Per version:");
        for (version, count) in &stats.per_version {
            println!("  {version:<12} {count}");
        }
    }
    Ok(())
}

async fn replay_entry(app: &App, id: &str) -> Result<i32, CliError> {
    let outcome = replay(&app.history, &app.activation, &app.engine, id).await?;
    debug!(
        "Replay of #{} exited with {}",
        outcome.entry.id, outcome.exit_code
    );
    Ok(outcome.exit_code)
}

/// Store one invocation reported by the shim. Commands of the manager
/// itself are dropped silently.
fn record(app: &App, args: RecordArgs) -> Result<i32, CliError> {
    let version = VersionId::parse_token(&args.version).map_err(CvmError::from)?;
    let duration = Duration::from_millis(args.duration_ms);
    let command = std::iter::once(app.config.binary_name.as_str())
        .chain(args.command.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");

    let timestamp = Utc::now()
        - chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    let stored = app.history.append(NewEntry {
        version,
        timestamp,
        command,
        duration,
        exit_code: args.exit_code,
        stdout: args.stdout,
        stderr: args.stderr,
    })?;

    if let Some(entry) = stored {
        debug!("Recorded history entry #{}", entry.id);
    }
    Ok(0)
}
