//! Persistent application configuration model and defaults.

use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Root configuration read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library indexing preferences.
    pub library: LibraryConfig,
}

/// Library indexing preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Root folders scanned for audio files.
    #[serde(default)]
    pub folders: Vec<String>,
    /// File extensions considered audio, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [
        "aac", "aif", "aiff", "ape", "flac", "m4a", "mp3", "ogg", "opus", "wav", "wma",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

/// Path of the user config file, if a config directory exists.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tunedex").join("config.toml"))
}

/// Loads the user config, falling back to defaults when the file is
/// missing (logged at debug, normal on first run) or unparseable
/// (logged at warn).
pub fn load_or_default() -> Config {
    let Some(path) = config_file_path() else {
        warn!("No config directory available; using default configuration");
        return Config::default();
    };
    load_from_path(&path)
}

fn load_from_path(path: &Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => {
            debug!(
                "No config file at {}; using default configuration",
                path.display()
            );
            return Config::default();
        }
    };

    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse {}: {}; using default configuration",
                path.display(),
                err
            );
            Config::default()
        }
    }
}
