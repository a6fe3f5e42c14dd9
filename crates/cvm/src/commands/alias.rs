use super::parse_version;
use crate::app::App;
use crate::error::CliError;

pub fn set(
    app: &App,
    name: &str,
    version: &str,
    description: Option<&str>,
) -> Result<i32, CliError> {
    let version = parse_version(version)?;
    app.activation
        .resolver()
        .aliases()
        .set(name, &version, description)?;
    println!("{name} -> {version}");
    Ok(0)
}

pub fn get(app: &App, name: &str) -> Result<i32, CliError> {
    let alias = app.activation.resolver().aliases().get(name)?;
    match alias.description {
        Some(description) => println!("{} ({description})", alias.version),
        None => println!("{}", alias.version),
    }
    Ok(0)
}

pub fn remove(app: &App, name: &str) -> Result<i32, CliError> {
    app.activation.resolver().aliases().remove(name)?;
    println!("Removed alias {name}");
    Ok(0)
}

pub fn list(app: &App) -> Result<i32, CliError> {
    let aliases = app.activation.resolver().aliases().list()?;
    if aliases.is_empty() {
        println!("No aliases defined");
    }
    for alias in aliases {
        match alias.description {
            Some(description) => println!("{} -> {}  {description}", alias.name, alias.version),
            None => println!("{} -> {}", alias.name, alias.version),
        }
    }
    Ok(0)
}
