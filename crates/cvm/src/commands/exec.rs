use console::style;
use cvm_backend::{CvmError, VersionId};
use cvm_exec::{
    ExecContext, TABLE_COLUMN_WIDTH, UNIFIED_CONTEXT, are_outputs_identical, rank,
    render_ranking, render_stats, render_table, render_unified,
};
use log::warn;

use super::print_warning;
use crate::app::App;
use crate::cli::DiffFormat;
use crate::error::CliError;

pub const DEFAULT_ITERATIONS: u32 = 5;
const ITERATIONS_FLAG: &str = "--iterations";

fn resolve_target(app: &App, token: &str) -> Result<VersionId, CvmError> {
    app.activation
        .resolver()
        .resolve_token(token.trim())
        .map(|(version, _)| version)
}

fn require_command(command: &[String]) -> Result<(), CvmError> {
    if command.is_empty() {
        Err(CvmError::MissingCommand)
    } else {
        Ok(())
    }
}

pub async fn compare(
    app: &App,
    left: &str,
    right: &str,
    format: DiffFormat,
    command: &[String],
) -> Result<i32, CliError> {
    require_command(command)?;
    let left = resolve_target(app, left)?;
    let right = resolve_target(app, right)?;

    let ctx = ExecContext::with_timeout(app.settings.command_timeout());
    let outcome = app.engine.compare(&ctx, &left, &right, command).await;
    if let Some(error) = &outcome.first_error {
        warn!("Comparison ran with errors: {error}");
        print_warning(error);
    }

    let [left_result, right_result] = outcome.items.as_slice() else {
        return Ok(1);
    };

    if are_outputs_identical(left_result, right_result) {
        println!("{}", style("OUTPUTS ARE IDENTICAL").green().bold());
        print!("{}", left_result.merged_output());
        return Ok(0);
    }

    let rendered = match format {
        DiffFormat::Table => render_table(left_result, right_result, TABLE_COLUMN_WIDTH),
        DiffFormat::Unified => render_unified(left_result, right_result, UNIFIED_CONTEXT),
    };
    print!("{rendered}");
    Ok(0)
}

/// Pull a trailing `--iterations N` (or `--iterations=N`) off the command.
/// Anything else stays part of the command.
pub fn split_iterations(mut command: Vec<String>) -> (Vec<String>, Option<u32>) {
    if let Some(last) = command.last()
        && let Some(value) = last.strip_prefix(ITERATIONS_FLAG).and_then(|rest| rest.strip_prefix('='))
        && let Ok(iterations) = value.parse::<u32>()
    {
        command.pop();
        return (command, Some(iterations));
    }

    let len = command.len();
    if len >= 2
        && command[len - 2] == ITERATIONS_FLAG
        && let Ok(iterations) = command[len - 1].parse::<u32>()
    {
        command.truncate(len - 2);
        return (command, Some(iterations));
    }

    (command, None)
}

pub async fn benchmark(
    app: &App,
    versions: &str,
    iterations: Option<u32>,
    command: Vec<String>,
) -> Result<i32, CliError> {
    let (command, trailing) = split_iterations(command);
    require_command(&command)?;
    let iterations = iterations
        .or(trailing)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_ITERATIONS);

    let targets = versions
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| resolve_target(app, token))
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(CvmError::version_not_found(versions).into());
    }

    println!(
        "Benchmarking `{}` on {} version(s), {iterations} iteration(s) each",
        command.join(" "),
        targets.len()
    );

    let ctx = ExecContext::with_timeout(app.settings.command_timeout());
    let outcome = app
        .engine
        .benchmark(&ctx, &targets, &command, iterations as usize)
        .await;
    if let Some(error) = &outcome.first_error {
        warn!("Benchmark ran with errors: {error}");
        print_warning(error);
    }

    let ranked = rank(&outcome.items);
    println!();
    print!("{}", render_stats(&ranked));
    println!();
    print!("{}", render_ranking(&ranked));
    Ok(0)
}
