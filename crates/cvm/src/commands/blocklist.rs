use super::parse_version;
use crate::app::App;
use crate::error::CliError;

pub fn block(app: &App, token: &str) -> Result<i32, CliError> {
    let version = parse_version(token)?;
    if app.activation.resolver().blocklist().block(&version)? {
        println!("Blocked {version}");
    } else {
        println!("{version} was already blocked");
    }
    Ok(0)
}

pub fn unblock(app: &App, token: &str) -> Result<i32, CliError> {
    let version = parse_version(token)?;
    if app.activation.resolver().blocklist().unblock(&version)? {
        println!("Unblocked {version}");
    } else {
        println!("{version} was not blocked");
    }
    Ok(0)
}

pub fn list(app: &App) -> Result<i32, CliError> {
    let blocked = app.activation.resolver().blocklist().list()?;
    if blocked.is_empty() {
        println!("No blocked versions");
    }
    for version in blocked {
        println!("{version}");
    }
    Ok(0)
}
