//! Locating the model configuration on disk.
//!
//! Lookup order:
//! 1. an explicit path from the caller, which must exist
//! 2. `NTPP_CONFIG`, a direct file path
//! 3. `model.toml` or `model.json` under `NTPP_CONFIG_DIR`
//! 4. the same names under the XDG config directory (`~/.config/ntpp/`)
//! 5. built-in defaults

use std::fmt;
use std::path::{Path, PathBuf};

use crate::model::ModelConfig;
use crate::validate::{ValidationError, ValidationResult};

pub const ENV_CONFIG_PATH: &str = "NTPP_CONFIG";
pub const ENV_CONFIG_DIR: &str = "NTPP_CONFIG_DIR";

/// File names probed inside a config directory, first match wins.
const CONFIG_FILENAMES: [&str; 2] = ["model.toml", "model.json"];

const APP_DIR: &str = "ntpp";

/// Where a configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    /// `NTPP_CONFIG` or `NTPP_CONFIG_DIR`.
    Environment,
    XdgConfig,
    #[default]
    BuiltinDefault,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit path",
            Self::Environment => "environment",
            Self::XdgConfig => "xdg config dir",
            Self::BuiltinDefault => "defaults",
        })
    }
}

/// A validated configuration and its origin.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ModelConfig,
    /// `None` when the defaults were used.
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Find the config file to load without reading it.
pub fn resolve_config_path(
    explicit: Option<&Path>,
) -> ValidationResult<(Option<PathBuf>, ConfigSource)> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok((Some(path.to_path_buf()), ConfigSource::Explicit))
        } else {
            Err(ValidationError::IoError(format!(
                "config file {} does not exist",
                path.display()
            )))
        };
    }

    let env_file = std::env::var_os(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .filter(|p| p.exists());
    let env_dir = || std::env::var_os(ENV_CONFIG_DIR).and_then(|d| probe_dir(Path::new(&d)));
    let xdg = || xdg_config_dir().and_then(|d| probe_dir(&d));

    let found = env_file
        .or_else(env_dir)
        .map(|p| (p, ConfigSource::Environment))
        .or_else(|| xdg().map(|p| (p, ConfigSource::XdgConfig)));

    Ok(match found {
        Some((path, source)) => (Some(path), source),
        None => (None, ConfigSource::BuiltinDefault),
    })
}

/// Locate, load and validate the model configuration.
pub fn resolve_config(explicit: Option<&Path>) -> ValidationResult<ResolvedConfig> {
    let (path, source) = resolve_config_path(explicit)?;
    let config = match path.as_deref() {
        Some(p) => ModelConfig::from_file(p)?,
        None => ModelConfig::default().validated()?,
    };
    Ok(ResolvedConfig {
        config,
        path,
        source,
    })
}

fn probe_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// `$XDG_CONFIG_HOME/ntpp`, or the platform equivalent.
pub fn xdg_config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(APP_DIR))
}
