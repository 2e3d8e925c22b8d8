//! Sparkle configuration.
//!
//! Loaded from `~/.sparkle/config.toml`. A missing file yields defaults;
//! nothing is written until a setting changes.
//!
//! The server URL is resolved through a chain:
//!
//! 1. `--server <url>`: explicit per-command override
//! 2. `SPARKLE_SERVER_URL` env var
//! 3. `server-url` in the config file
//!
//! An empty result means local-only mode.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Env var consulted between `--server` and the config file.
pub const SERVER_URL_ENV: &str = "SPARKLE_SERVER_URL";

/// Errors that can occur loading or saving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Sparkle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Where projects are created and listed.
    pub projects_folder: PathBuf,

    /// Full path of the loaded project, if any.
    pub project_active_folder: Option<PathBuf>,

    /// Base URL of the pipeline server. Empty means local-only.
    pub server_url: String,

    pub monitor: MonitorConfig,
}

/// Health-check cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MonitorConfig {
    pub connected_interval_secs: u64,
    pub disconnected_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connected_interval_secs: 15,
            disconnected_interval_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_folder: default_projects_folder(),
            project_active_folder: None,
            server_url: String::new(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// `~/Documents/Sparkle`, falling back to a relative folder without a home.
fn default_projects_folder() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .map_or_else(|| PathBuf::from("Sparkle"), |d| d.join("Sparkle"))
}

impl Config {
    /// The config file path: `~/.sparkle/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".sparkle").join("config.toml"))
    }

    /// Load from `~/.sparkle/config.toml`, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoHome)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to `~/.sparkle/config.toml`, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, contents).map_err(io_err)
    }

    // ── Settings ──

    pub fn update_active_project(&mut self, project_path: impl Into<PathBuf>) {
        self.project_active_folder = Some(project_path.into());
    }

    pub fn set_server_url(&mut self, url: &str) {
        self.server_url = url.trim().to_string();
    }

    pub fn set_projects_folder(&mut self, folder: impl Into<PathBuf>) {
        self.projects_folder = folder.into();
    }

    /// Name of the loaded project: the last component of its folder.
    pub fn active_project_name(&self) -> Option<String> {
        self.project_active_folder
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Resolve the server URL from flag, environment, then config.
pub fn resolve_server_url(explicit: Option<&str>, config: &Config) -> String {
    resolve_with_env(explicit, env::var(SERVER_URL_ENV).ok(), config)
}

fn resolve_with_env(explicit: Option<&str>, from_env: Option<String>, config: &Config) -> String {
    // 1. Explicit --server flag, even if empty (forces local-only).
    if let Some(url) = explicit {
        return url.trim().to_string();
    }

    // 2. SPARKLE_SERVER_URL.
    if let Some(url) = from_env
        && !url.trim().is_empty()
    {
        return url.trim().to_string();
    }

    // 3. Config file.
    config.server_url.trim().to_string()
}
