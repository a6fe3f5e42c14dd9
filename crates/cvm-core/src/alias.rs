use std::path::PathBuf;

use cvm_backend::{CvmError, VersionId, is_latest_keyword, is_valid_linked_name};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::fs::write_atomic;
use crate::store::VersionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AliasRecord {
    version: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub version: VersionId,
    pub description: Option<String>,
}

/// One file per alias under `aliases_dir`, holding either a JSON record or a
/// legacy bare version string.
#[derive(Debug, Clone)]
pub struct AliasStore {
    store: VersionStore,
}

impl AliasStore {
    pub fn new(store: VersionStore) -> Self {
        Self { store }
    }

    fn alias_file(&self, name: &str) -> PathBuf {
        self.store.config().paths.aliases_dir.join(name)
    }

    /// Create or overwrite `name`. The target version must be installed.
    pub fn set(
        &self,
        name: &str,
        version: &VersionId,
        description: Option<&str>,
    ) -> Result<Alias, CvmError> {
        let name = validate_name(name)?;
        self.store.exists(version)?;

        let record = AliasRecord {
            version: version.clone(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| CvmError::serialization_from("alias", e))?;
        write_atomic(&self.alias_file(name), json.as_bytes())?;
        debug!("Alias {name} -> {version}");

        Ok(Alias {
            name: name.to_string(),
            version: record.version,
            description: record.description,
        })
    }

    pub fn get(&self, name: &str) -> Result<Alias, CvmError> {
        let name = name.trim();
        let not_found = || CvmError::AliasNotFound {
            name: name.to_string(),
        };
        if !is_valid_linked_name(name) {
            return Err(not_found());
        }

        let content = match std::fs::read_to_string(self.alias_file(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let record = parse_record(&content)?;

        Ok(Alias {
            name: name.to_string(),
            version: record.version,
            description: record.description,
        })
    }

    pub fn remove(&self, name: &str) -> Result<(), CvmError> {
        let alias = self.get(name)?;
        std::fs::remove_file(self.alias_file(&alias.name))?;
        Ok(())
    }

    /// All readable aliases sorted by name.
    pub fn list(&self) -> Result<Vec<Alias>, CvmError> {
        let entries = match std::fs::read_dir(&self.store.config().paths.aliases_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut aliases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match self.get(&name) {
                Ok(alias) => aliases.push(alias),
                Err(e) => warn!("Ignoring unreadable alias {name}: {e}"),
            }
        }

        aliases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(aliases)
    }

    pub fn names_for(&self, version: &VersionId) -> Result<Vec<String>, CvmError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|alias| &alias.version == version)
            .map(|alias| alias.name)
            .collect())
    }
}

fn validate_name(name: &str) -> Result<&str, CvmError> {
    let name = name.trim();
    if is_latest_keyword(name) {
        return Err(CvmError::ReservedAlias {
            name: name.to_string(),
        });
    }
    if !is_valid_linked_name(name) || name.starts_with('.') {
        return Err(CvmError::InvalidAliasName {
            name: name.to_string(),
        });
    }
    Ok(name)
}

fn parse_record(content: &str) -> Result<AliasRecord, CvmError> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| CvmError::serialization_from("alias", e));
    }

    Ok(AliasRecord {
        version: VersionId::parse_token(trimmed)?,
        description: None,
    })
}
