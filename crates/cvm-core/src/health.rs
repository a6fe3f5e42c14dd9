use std::fmt;

use cvm_shell::VerificationResult;

use crate::activation::{ActivationManager, ActivationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl HealthCheck {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.status != CheckStatus::Fail)
    }
}

/// Inspect the installation without changing anything.
pub fn run_health_check(manager: &ActivationManager) -> HealthReport {
    let resolver = manager.resolver();
    let store = resolver.store();
    let paths = &store.config().paths;
    let mut checks = Vec::new();

    checks.push(if paths.root.is_dir() {
        HealthCheck::new("root", CheckStatus::Ok, paths.root.display().to_string())
    } else {
        HealthCheck::new(
            "root",
            CheckStatus::Fail,
            format!("{} does not exist", paths.root.display()),
        )
    });

    checks.push(match store.list() {
        Ok(versions) if versions.is_empty() => {
            HealthCheck::new("versions", CheckStatus::Warn, "no versions installed")
        }
        Ok(versions) => HealthCheck::new(
            "versions",
            CheckStatus::Ok,
            format!("{} installed", versions.len()),
        ),
        Err(e) => HealthCheck::new("versions", CheckStatus::Fail, e.to_string()),
    });

    match manager.state() {
        Ok(ActivationState::Active(version)) => {
            checks.push(if store.is_installed(&version) {
                HealthCheck::new("active", CheckStatus::Ok, version.to_string())
            } else {
                HealthCheck::new(
                    "active",
                    CheckStatus::Fail,
                    format!("{version} is active but not installed"),
                )
            });
            checks.push(match resolver.blocklist().is_blocked(&version) {
                Ok(false) => HealthCheck::new("blocklist", CheckStatus::Ok, "active version allowed"),
                Ok(true) => HealthCheck::new(
                    "blocklist",
                    CheckStatus::Fail,
                    format!("active version {version} is blocked"),
                ),
                Err(e) => HealthCheck::new("blocklist", CheckStatus::Fail, e.to_string()),
            });
        }
        Ok(ActivationState::Inactive) => {
            checks.push(HealthCheck::new(
                "active",
                CheckStatus::Warn,
                "no active version",
            ));
        }
        Err(e) => checks.push(HealthCheck::new("active", CheckStatus::Fail, e.to_string())),
    }

    checks.push(match manager.shims().installed_shim() {
        Some(path) if manager.shims().is_ready() => {
            HealthCheck::new("shim", CheckStatus::Ok, path.display().to_string())
        }
        Some(path) => HealthCheck::new(
            "shim",
            CheckStatus::Fail,
            format!("{} is not executable", path.display()),
        ),
        None => HealthCheck::new(
            "shim",
            CheckStatus::Fail,
            "no shim; run `cvm use <version>`",
        ),
    });

    checks.push(match manager.verify_profile() {
        Some(VerificationResult::Configured) => {
            HealthCheck::new("profile", CheckStatus::Ok, "PATH block present")
        }
        Some(VerificationResult::Outdated) => HealthCheck::new(
            "profile",
            CheckStatus::Warn,
            "PATH block points elsewhere; run `cvm use` again",
        ),
        Some(VerificationResult::NotConfigured | VerificationResult::ConfigFileNotFound) => {
            HealthCheck::new("profile", CheckStatus::Warn, "PATH block missing")
        }
        Some(VerificationResult::Error(details)) => {
            HealthCheck::new("profile", CheckStatus::Fail, details)
        }
        None => HealthCheck::new("profile", CheckStatus::Warn, "shell profile unknown"),
    });

    checks.push(match manager.verify_path() {
        Ok(()) => HealthCheck::new("path", CheckStatus::Ok, "shim directory takes priority"),
        Err(e) => HealthCheck::new("path", CheckStatus::Warn, e.to_string()),
    });

    HealthReport { checks }
}
