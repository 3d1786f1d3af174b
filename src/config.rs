//! Scope configuration.
//!
//! A scope names one source/target pair together with its exclusion globs.
//! Scopes live in a TOML file, by default `scopes.toml` in the platform
//! config directory:
//!
//! ```toml
//! [scopes.photos]
//! source = "/home/me/Pictures"
//! target = "/mnt/backup/photos"
//! exclude = ["*.tmp", ".cache"]
//! algorithm = "md5"
//! ```
//!
//! Values can be overridden from the environment with the `RUSTMIRROR_`
//! prefix, using `__` for nesting (`RUSTMIRROR_SCOPES__PHOTOS__TARGET`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::HashAlgorithm;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RUSTMIRROR_";
/// Environment variable naming the scopes file.
pub const CONFIG_ENV_VAR: &str = "RUSTMIRROR_CONFIG";
/// File name of the default scopes file.
pub const CONFIG_FILE_NAME: &str = "scopes.toml";

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No scope with this name is configured.
    #[error(
        "Unknown scope '{name}'{}",
        .suggestion.as_ref().map(|s| format!(", did you mean '{s}'?")).unwrap_or_default()
    )]
    UnknownScope {
        /// Requested scope name
        name: String,
        /// Closest configured scope name, if any is close enough
        suggestion: Option<String>,
    },

    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The platform config directory cannot be determined.
    #[error("Failed to determine the configuration directory")]
    NoConfigDir,

    /// The configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Invalid(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

/// One named source/target pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Directory to back up
    pub source: PathBuf,
    /// Target directory holding the mirror and the archive
    pub target: PathBuf,
    /// Exclusion globs, relative to the source root
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Digest algorithm used when the target is initialized
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

/// All configured scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Scopes by name
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeConfig>,
}

impl Config {
    /// Load the scopes file.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used and a missing file means no scopes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if !path.is_file() => Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    /// Load `path` merged with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the merged configuration does not
    /// deserialize.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        log::debug!("Loading scopes from {}", path.display());
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Default location of the scopes file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if there is no home directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let project_dirs =
            ProjectDirs::from("com", "rustmirror", "rustmirror").ok_or(ConfigError::NoConfigDir)?;
        Ok(project_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Look up a scope by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownScope`] with the closest known name as
    /// a suggestion.
    pub fn scope(&self, name: &str) -> Result<&ScopeConfig, ConfigError> {
        self.scopes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownScope {
                name: name.to_string(),
                suggestion: self.suggest(name),
            })
    }

    /// Configured scope names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    fn suggest(&self, name: &str) -> Option<String> {
        self.names()
            .map(|known| (known, strsim::jaro_winkler(name, known)))
            .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(known, _)| known.to_string())
    }
}
