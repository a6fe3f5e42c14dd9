use console::style;
use cvm_core::{ActivationState, CheckStatus, run_health_check};

use crate::app::App;
use crate::error::CliError;

/// Exits 1 when no version is active so scripts can test for it.
pub fn current(app: &App) -> Result<i32, CliError> {
    match app.activation.state()? {
        ActivationState::Active(version) => {
            println!("{version}");
            Ok(0)
        }
        ActivationState::Inactive => {
            eprintln!("No active version");
            Ok(1)
        }
    }
}

pub fn health_check(app: &App) -> i32 {
    let report = run_health_check(&app.activation);
    for check in &report.checks {
        let status = match check.status {
            CheckStatus::Ok => style(check.status.to_string()).green(),
            CheckStatus::Warn => style(check.status.to_string()).yellow(),
            CheckStatus::Fail => style(check.status.to_string()).red(),
        };
        println!("{status:>6}  {:<10} {}", check.name, check.detail);
    }
    i32::from(!report.is_healthy())
}

pub fn config(app: &App) -> Result<i32, CliError> {
    println!("root:       {}", app.paths.root.display());
    println!("versions:   {}", app.paths.versions_dir.display());
    println!("aliases:    {}", app.paths.aliases_dir.display());
    println!("shims:      {}", app.paths.shim_dir.display());
    println!("settings:   {}", app.paths.settings_file().display());
    println!("log:        {}", app.paths.log_file().display());
    if let Some(profile) = app.activation.profile() {
        println!("profile:    {} ({})", profile.path.display(), profile.shell);
    }
    println!();
    let settings = serde_json::to_string_pretty(&app.settings).map_err(std::io::Error::other)?;
    println!("{settings}");
    Ok(0)
}
