use std::path::Path;

use console::style;
use cvm_backend::{CvmError, Installer, VersionId, is_latest_keyword};
use cvm_core::{ActivationState, ProfileUpdate};
use log::{info, warn};

use super::{parse_version, print_warning};
use crate::app::{App, http_installer};
use crate::error::CliError;

pub async fn use_version(app: &App, token: Option<&str>, cwd: &Path) -> Result<i32, CliError> {
    let report = app.activation.activate(token, cwd).await?;

    if report.installed {
        println!("Installed {}", report.version);
    }
    println!(
        "Now using {} ({})",
        style(&report.version).green().bold(),
        report.source
    );
    if let ProfileUpdate::Updated(path) = &report.profile {
        println!(
            "Added {} to PATH in {}; restart your shell or source it",
            app.paths.shim_dir.display(),
            path.display()
        );
    }
    for warning in &report.warnings {
        print_warning(warning);
    }
    Ok(0)
}

pub async fn install(
    app: &App,
    token: &str,
    sha256: Option<String>,
    force: bool,
) -> Result<i32, CliError> {
    let version = if is_latest_keyword(token) {
        app.latest.latest_version().await?
    } else {
        let id = parse_version(token)?;
        match id.as_release() {
            Some(version) => *version,
            None => return Err(CvmError::version_not_found(&id).into()),
        }
    };
    let id = VersionId::Release(version);
    let store = app.store();

    if store.is_installed(&id) && !force {
        println!("{id} is already installed (use --force to reinstall)");
        return Ok(0);
    }

    let installer = http_installer(&app.settings, sha256)?;
    println!("Downloading {}", installer.download_url(&version));
    installer.install(&version, &store.binary_path(&id)).await?;
    store.exists(&id)?;
    info!("Installed {id}");
    println!("Installed {}", style(&id).green());
    Ok(0)
}

pub fn list(app: &App) -> Result<i32, CliError> {
    let store = app.store();
    let versions = store.list()?;
    if versions.is_empty() {
        println!("No versions installed. Try `cvm install <version>`.");
        return Ok(0);
    }

    let active = match app.activation.state()? {
        ActivationState::Active(version) => Some(version),
        ActivationState::Inactive => None,
    };
    let resolver = app.activation.resolver();

    for version in versions {
        let is_active = active.as_ref() == Some(&version);
        let marker = if is_active { "*" } else { " " };
        let mut line = format!("{marker} {version}");
        let aliases = resolver.aliases().names_for(&version)?;
        if !aliases.is_empty() {
            line.push_str(&format!(" ({})", aliases.join(", ")));
        }
        if resolver.blocklist().is_blocked(&version)? {
            line.push_str(&format!(" {}", style("[blocked]").red()));
        }

        if is_active {
            println!("{}", style(line).green());
        } else {
            println!("{line}");
        }
    }
    Ok(0)
}

pub fn remove(app: &App, token: &str) -> Result<i32, CliError> {
    let version = parse_version(token)?;
    app.store().remove(&version)?;

    if app.activation.state()? == ActivationState::Active(version.clone()) {
        warn!("Removed the active version {version}");
        app.activation.clear_active()?;
        print_warning(format_args!(
            "{version} was the active version; no version is active now"
        ));
    }
    println!("Removed {version}");
    Ok(0)
}

pub fn clear(app: &App) -> Result<i32, CliError> {
    let removed = app.store().clear()?;
    app.activation.clear_active()?;
    println!("Removed {removed} version(s)");
    Ok(0)
}

pub fn link(app: &App, from: &Path, name: &str) -> Result<i32, CliError> {
    let version = app.store().link(from, name)?;
    println!("Linked {} as {version}", from.display());
    Ok(0)
}
