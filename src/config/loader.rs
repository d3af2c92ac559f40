use crate::config::schema::{PatcherConfig, ValidationError};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "DOMAIN_PATCHER_CONFIG";

/// Environment variable naming the installation root.
pub const GAME_DIR_ENV: &str = "DOMAIN_PATCHER_GAME_DIR";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// `~/.config/domain-patcher/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    home::home_dir().map(|home| user_config_path(&home))
}

fn user_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("domain-patcher").join("config.toml")
}

/// Where to look for a config file, and whether it has to exist.
///
/// An explicitly named file (flag or environment) must exist; the per-user
/// file is optional.
fn resolve(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    user_default: Option<PathBuf>,
) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some((PathBuf::from(value), true));
    }
    user_default.map(|path| (path, false))
}

/// Load the config named by `explicit`, `$DOMAIN_PATCHER_CONFIG`, or the
/// per-user default, falling back to built-in defaults when none exists.
pub fn load_default(explicit: Option<&Path>) -> Result<PatcherConfig, ConfigError> {
    load_resolved(resolve(
        explicit,
        std::env::var_os(CONFIG_ENV),
        default_config_path(),
    ))
}

fn load_resolved(resolved: Option<(PathBuf, bool)>) -> Result<PatcherConfig, ConfigError> {
    match resolved {
        Some((path, required)) if required || path.is_file() => {
            debug!("Loading config from {}", path.display());
            load_from_path(&path)
        }
        _ => {
            debug!("No config file found, using defaults");
            Ok(PatcherConfig::default())
        }
    }
}
