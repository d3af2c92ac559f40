use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Settings read from `config.toml`. Every field is optional.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    /// Domain written over the original one.
    #[serde(default)]
    pub target_domain: Option<String>,
    /// Installation root holding `Client/` and `Server/`.
    #[serde(default)]
    pub game_dir: Option<PathBuf>,
    /// Re-sign the client after patching where the platform requires it.
    #[serde(default = "default_sign")]
    pub sign: bool,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            target_domain: None,
            game_dir: None,
            sign: true,
            auth: AuthSettings::default(),
        }
    }
}

fn default_sign() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSettings {
    /// Domain of the session server. Falls back to the target domain.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            domain: None,
            timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

impl AuthSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PatcherConfig {
    /// Reject empty values and a zero timeout.
    ///
    /// A target domain the patcher cannot use is accepted here; the patcher
    /// falls back to the default target for it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self
            .target_domain
            .as_deref()
            .is_some_and(|d| d.trim().is_empty())
        {
            issues.push(ValidationIssue::EmptyField("target_domain"));
        }
        if self
            .game_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            issues.push(ValidationIssue::EmptyField("game_dir"));
        }
        if self
            .auth
            .domain
            .as_deref()
            .is_some_and(|d| d.trim().is_empty())
        {
            issues.push(ValidationIssue::EmptyField("auth.domain"));
        }
        if self.auth.timeout_secs == 0 {
            issues.push(ValidationIssue::ZeroTimeout);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Session server domain: `[auth] domain`, else the target domain.
    pub fn auth_domain(&self) -> Option<&str> {
        self.auth
            .domain
            .as_deref()
            .or(self.target_domain.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyField(&'static str),
    ZeroTimeout,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyField(field) => write!(f, "'{field}' must not be empty"),
            ValidationIssue::ZeroTimeout => write!(f, "'auth.timeout_secs' must be at least 1"),
        }
    }
}
