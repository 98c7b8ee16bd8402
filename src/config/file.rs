//! Configuration file support for persistent settings.
//!
//! This module provides support for loading configuration from a TOML file
//! located at `~/.config/project-manager/config.toml` (or the platform-specific
//! equivalent). Configuration file values serve as defaults that can be
//! overridden by CLI arguments.
//!
//! # Layering
//!
//! The precedence order is: **CLI argument > config file > hardcoded default**.
//!
//! # Example config
//!
//! ```toml
//! projects_dir = "~/projects/personal"
//! data_file = "~/projects/personal/.projects.json"
//!
//! [cache_db]
//! min = 0
//! max = 999
//!
//! [dev_server]
//! command = "pnpm dev"
//! stop_timeout_secs = 5
//!
//! [editor]
//! command = "code"
//!
//! [provision]
//! github_owner = "acme"
//! api_template = "api.saasdev"
//! app_template = "www.saasdev"
//! template_slug = "saasdev"
//! template_display_name = "SaasDev"
//! package_manager = "pnpm"
//! use_trash = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration file structure.
///
/// All fields are `Option<T>` so we can detect which values are present in the
/// config file and apply layered configuration (CLI > config file > defaults).
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Directory whose immediate subdirectories are scanned for projects
    pub projects_dir: Option<PathBuf>,

    /// Location of the persisted project snapshot
    pub data_file: Option<PathBuf>,

    /// Cache database index range
    #[serde(default)]
    pub cache_db: FileCacheDbConfig,

    /// Frontend dev-server options
    #[serde(default)]
    pub dev_server: FileDevServerConfig,

    /// Editor options
    #[serde(default)]
    pub editor: FileEditorConfig,

    /// Provisioning options
    #[serde(default)]
    pub provision: FileProvisionConfig,
}

/// Cache database range from the configuration file.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileCacheDbConfig {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// Dev-server options from the configuration file.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileDevServerConfig {
    /// Shell command starting the frontend dev server
    pub command: Option<String>,

    /// Seconds to wait after a graceful stop before force-killing
    pub stop_timeout_secs: Option<u64>,
}

/// Editor options from the configuration file.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileEditorConfig {
    /// Program opened with the project directory as its only argument
    pub command: Option<String>,
}

/// Provisioning options from the configuration file.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileProvisionConfig {
    /// GitHub account owning the template and project repositories
    pub github_owner: Option<String>,

    /// Template repository for the backend
    pub api_template: Option<String>,

    /// Template repository for the frontend
    pub app_template: Option<String>,

    /// Name the templates use for themselves, replaced in `.env` files
    pub template_slug: Option<String>,

    /// Display name the templates use, replaced in `.env` files
    pub template_display_name: Option<String>,

    /// Package manager used to install frontend dependencies
    pub package_manager: Option<String>,

    /// Whether deleted projects go to the system trash instead of being removed.
    /// Defaults to `true` when absent.
    pub use_trash: Option<bool>,
}

/// Expand a leading `~` in a path to the user's home directory.
///
/// Paths that don't start with `~` are returned unchanged.
///
/// # Examples
///
/// ```
/// # use std::path::PathBuf;
/// # use project_manager::config::file::expand_tilde;
/// let absolute = PathBuf::from("/absolute/path");
/// assert_eq!(expand_tilde(&absolute), PathBuf::from("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Expand a leading `~` and anchor a relative path at the current directory.
///
/// Falls back to the tilde-expanded path if the current directory is
/// unavailable.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    std::path::absolute(&expanded).unwrap_or(expanded)
}

impl FileConfig {
    /// Returns the path where the configuration file is expected.
    ///
    /// `Some(PathBuf)` with `<config_dir>/project-manager/config.toml`, or
    /// `None` if the config directory cannot be determined.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("project-manager").join("config.toml"))
    }

    /// Load configuration from the default config file location.
    ///
    /// If the config file doesn't exist, returns a default (empty) configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, defaulting when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or contains
    /// invalid TOML or unexpected fields.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file at {}: {e}", path.display())
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file at {}: {e}", path.display())
        })?;

        Ok(config)
    }
}
