use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Name reserved for "the newest published release"; never usable as an
/// alias or a linked version name.
pub const LATEST_KEYWORD: &str = "latest";

#[must_use]
pub fn is_latest_keyword(token: &str) -> bool {
    token.trim().eq_ignore_ascii_case(LATEST_KEYWORD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected X.Y.Z format, got: {input}")]
    InvalidFormat { input: String },
    #[error("Invalid {component} version: {value}")]
    InvalidComponent {
        component: VersionComponent,
        value: String,
    },
    #[error("Invalid version constraint: {input}")]
    InvalidConstraint { input: String },
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().strip_prefix('v').unwrap_or(s.trim());
        let invalid = || VersionParseError::InvalidFormat {
            input: s.to_string(),
        };

        let mut parts = s.split('.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let minor_str = parts.next().ok_or_else(invalid)?;
        let patch_str = parts.next().ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let component = |component: VersionComponent, value: &str| {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::InvalidComponent {
                    component,
                    value: value.to_string(),
                });
            }
            value
                .parse::<u32>()
                .map_err(|_| VersionParseError::InvalidComponent {
                    component,
                    value: value.to_string(),
                })
        };

        Ok(Version::new(
            component(VersionComponent::Major, major_str)?,
            component(VersionComponent::Minor, minor_str)?,
            component(VersionComponent::Patch, patch_str)?,
        ))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ConstraintOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// An operator paired with a version, e.g. `>=1.2.3`. A bare version is an
/// `=` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    pub op: ConstraintOp,
    pub version: Version,
}

impl VersionConstraint {
    #[must_use]
    pub fn new(op: ConstraintOp, version: Version) -> Self {
        Self { op, version }
    }

    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            ConstraintOp::Eq => candidate == &self.version,
            ConstraintOp::Gt => candidate > &self.version,
            ConstraintOp::Ge => candidate >= &self.version,
            ConstraintOp::Lt => candidate < &self.version,
            ConstraintOp::Le => candidate <= &self.version,
        }
    }

    /// Highest candidate satisfying the constraint.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }

    /// Whether `input` starts with a comparison operator, i.e. is meant as a
    /// constraint rather than a literal version.
    #[must_use]
    pub fn looks_like_constraint(input: &str) -> bool {
        input.trim_start().starts_with(['>', '<', '='])
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Two-character operators must be tried before their prefixes.
        let (op, rest) = [
            (">=", ConstraintOp::Ge),
            ("<=", ConstraintOp::Le),
            (">", ConstraintOp::Gt),
            ("<", ConstraintOp::Lt),
            ("=", ConstraintOp::Eq),
        ]
        .into_iter()
        .find_map(|(prefix, op)| trimmed.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((ConstraintOp::Eq, trimmed));

        let rest = rest.trim_start();
        if rest.starts_with('v') || rest.is_empty() {
            return Err(VersionParseError::InvalidConstraint {
                input: trimmed.to_string(),
            });
        }

        let version = rest
            .parse()
            .map_err(|_| VersionParseError::InvalidConstraint {
                input: trimmed.to_string(),
            })?;

        Ok(Self { op, version })
    }
}

/// Identifier of an installed version directory: either a numeric release or
/// the name of a locally linked binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionId {
    Release(Version),
    Linked(String),
}

impl VersionId {
    #[must_use]
    pub fn as_release(&self) -> Option<&Version> {
        match self {
            Self::Release(version) => Some(version),
            Self::Linked(_) => None,
        }
    }

    /// Parse a directory or user token. Anything that is not a valid
    /// release number but is a plain single path component becomes a
    /// linked name.
    ///
    /// # Errors
    /// Returns an error when the token is empty, contains path separators or
    /// is a reserved keyword.
    pub fn parse_token(token: &str) -> Result<Self, VersionParseError> {
        let token = token.trim();
        if let Ok(version) = token.parse::<Version>() {
            return Ok(Self::Release(version));
        }
        if is_valid_linked_name(token) {
            Ok(Self::Linked(token.to_string()))
        } else {
            Err(VersionParseError::InvalidFormat {
                input: token.to_string(),
            })
        }
    }
}

#[must_use]
pub fn is_valid_linked_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !is_latest_keyword(name)
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_whitespace)
}

impl From<Version> for VersionId {
    fn from(version: Version) -> Self {
        Self::Release(version)
    }
}

impl FromStr for VersionId {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_token(s)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release(version) => version.fmt(f),
            Self::Linked(name) => f.write_str(name),
        }
    }
}

/// Releases sort numerically and before linked names; linked names sort
/// lexicographically among themselves.
impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Release(a), Self::Release(b)) => a.cmp(b),
            (Self::Release(_), Self::Linked(_)) => Ordering::Less,
            (Self::Linked(_), Self::Release(_)) => Ordering::Greater,
            (Self::Linked(a), Self::Linked(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_token(&raw).map_err(serde::de::Error::custom)
    }
}
