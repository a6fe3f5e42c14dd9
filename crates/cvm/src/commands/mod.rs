mod alias;
mod blocklist;
mod exec;
mod history;
mod status;
mod versions;

use std::path::Path;

use console::style;
use cvm_backend::{CvmError, VersionId};

use crate::app::App;
use crate::cli::{AliasCommand, Command};
use crate::error::CliError;

/// Run one command and return the process exit code.
pub async fn run(app: &App, command: Command, cwd: &Path) -> Result<i32, CliError> {
    match command {
        Command::Use { token } => versions::use_version(app, token.as_deref(), cwd).await,
        Command::Install {
            version,
            sha256,
            force,
        } => versions::install(app, &version, sha256, force).await,
        Command::List => versions::list(app),
        Command::Remove { version } => versions::remove(app, &version),
        Command::Clear => versions::clear(app),
        Command::Link { from, name } => versions::link(app, &from, &name),
        Command::Alias(command) => match command {
            AliasCommand::Set {
                name,
                version,
                description,
            } => alias::set(app, &name, &version, description.as_deref()),
            AliasCommand::Get { name } => alias::get(app, &name),
            AliasCommand::Remove { name } => alias::remove(app, &name),
            AliasCommand::List => alias::list(app),
        },
        Command::Compare {
            left,
            right,
            format,
            command,
        } => exec::compare(app, &left, &right, format, &command).await,
        Command::Benchmark {
            versions,
            iterations,
            command,
        } => exec::benchmark(app, &versions, iterations, command).await,
        Command::History(args) => history::run(app, args).await,
        Command::Block { version } => blocklist::block(app, &version),
        Command::Unblock { version } => blocklist::unblock(app, &version),
        Command::ListBlocked => blocklist::list(app),
        Command::Current => status::current(app),
        Command::HealthCheck => Ok(status::health_check(app)),
        Command::Config => status::config(app),
    }
}

/// A literal version string or linked name, no alias lookup.
fn parse_version(token: &str) -> Result<VersionId, CvmError> {
    Ok(VersionId::parse_token(token.trim())?)
}

fn print_warning(message: impl std::fmt::Display) {
    eprintln!("{} {message}", style("warning:").yellow().bold());
}
