//! Loading and storing the TOML configuration file.

use crate::error::ConfigError;
use shared::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_PATH: &str = ".learning-flows.toml";

const CONFIG_HEADER: &str = "# Learning Flows configuration\n\
                             # Dispatch policy, replay size and screen timings\n\
                             \n";

pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

/// Load the config at `path` (or the default location).
///
/// A missing file yields the defaults. Invalid values are fixed and logged;
/// a fixed file is written back so the fix persists.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no config at '{}', using defaults", path.display());
            return Ok(AppConfig::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let mut config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    let warnings = config.validate_and_fix();
    if !warnings.is_empty() {
        for warning in &warnings {
            log::warn!("{}: {warning}", path.display());
        }
        if let Err(error) = save_config(&path, &config) {
            // The fixed config is still usable in memory.
            log::warn!("{error}");
        }
    }

    log::debug!("loaded config from '{}'", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let toml_content = toml::to_string_pretty(config)?;
    fs::write(path, format!("{CONFIG_HEADER}{toml_content}")).map_err(|source| {
        ConfigError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// The config as it would be written to disk.
pub fn render_config(config: &AppConfig) -> Result<String, ConfigError> {
    Ok(format!("{CONFIG_HEADER}{}", toml::to_string_pretty(config)?))
}
